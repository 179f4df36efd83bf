//! Document text extraction and chunk production.

use serde_json::json;

use super::chunker;
use super::types::{Document, DocumentChunk, DocumentSource, DocumentType};
use crate::core::errors::ApiError;

pub struct DocumentProcessor {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl DocumentProcessor {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// Extract raw text from a document, dispatching on its type.
    pub fn extract_text(&self, document: &Document) -> Result<String, ApiError> {
        match &document.document_type {
            DocumentType::Text => match &document.source {
                DocumentSource::Inline(content) => Ok(content.clone()),
                DocumentSource::Path(path) => std::fs::read_to_string(path).map_err(|err| {
                    ApiError::Extraction(format!(
                        "failed to read {}: {}",
                        path.display(),
                        err
                    ))
                }),
            },
            DocumentType::Pdf => {
                let path = match &document.source {
                    DocumentSource::Path(path) => path,
                    DocumentSource::Inline(_) => {
                        return Err(ApiError::Extraction(
                            "pdf documents require a file path source".to_string(),
                        ))
                    }
                };
                pdf_extract::extract_text(path)
                    .map(|text| text.trim().to_string())
                    .map_err(|err| {
                        ApiError::Extraction(format!(
                            "pdf extraction failed for {}: {}",
                            path.display(),
                            err
                        ))
                    })
            }
            DocumentType::Image => Err(ApiError::UnsupportedType(
                "image: no OCR engine configured".to_string(),
            )),
            DocumentType::Other(name) => Err(ApiError::UnsupportedType(name.clone())),
        }
    }

    /// Extract, split, and wrap the document's text into chunks with
    /// contiguous indexes from 0. Embeddings are attached later, at store
    /// save time.
    pub fn process_document(&self, document: &Document) -> Result<Vec<DocumentChunk>, ApiError> {
        // Manual uploads carry their content inline and skip extraction;
        // they take the plain window splitter.
        if document.document_type == DocumentType::Text {
            if let DocumentSource::Inline(content) = &document.source {
                return Ok(self.wrap_plain(document, content));
            }
        }

        let text = self.extract_text(document)?;
        let pieces = chunker::split_text(&text, self.chunk_size, self.chunk_overlap);

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                DocumentChunk::new(&document.id, &document.conversation_id, piece, i)
            })
            .collect())
    }

    fn wrap_plain(&self, document: &Document, content: &str) -> Vec<DocumentChunk> {
        chunker::split_plain(content, self.chunk_size)
            .into_iter()
            .enumerate()
            .map(|(i, piece)| {
                let mut chunk =
                    DocumentChunk::new(&document.id, &document.conversation_id, piece.content, i);
                chunk.metadata = json!({ "window_index": piece.index });
                chunk
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn inline_doc(content: &str) -> Document {
        Document::new(
            "notes.txt",
            DocumentType::Text,
            DocumentSource::Inline(content.to_string()),
            "chat-1",
            Value::Object(serde_json::Map::new()),
        )
    }

    #[test]
    fn inline_text_produces_indexed_chunks() {
        let processor = DocumentProcessor::new(20, 4);
        let doc = inline_doc("aaaa bbbb cccc ddd eeeee ffff gggg hhhh iii");

        let chunks = processor.process_document(&doc).unwrap();
        assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i);
            assert_eq!(chunk.document_id, doc.id);
            assert_eq!(chunk.conversation_id, "chat-1");
            assert!(chunk.embedding.is_none());
        }
    }

    #[test]
    fn empty_document_produces_no_chunks() {
        let processor = DocumentProcessor::new(100, 20);
        let chunks = processor.process_document(&inline_doc("   ")).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn image_documents_are_unsupported() {
        let processor = DocumentProcessor::new(100, 20);
        let doc = Document::new(
            "scan.png",
            DocumentType::Image,
            DocumentSource::Path("scan.png".into()),
            "chat-1",
            Value::Object(serde_json::Map::new()),
        );
        assert!(matches!(
            processor.process_document(&doc),
            Err(ApiError::UnsupportedType(_))
        ));
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let processor = DocumentProcessor::new(100, 20);
        let doc = Document::new(
            "data.bin",
            DocumentType::Other("binary".to_string()),
            DocumentSource::Path("data.bin".into()),
            "chat-1",
            Value::Object(serde_json::Map::new()),
        );
        assert!(matches!(
            processor.extract_text(&doc),
            Err(ApiError::UnsupportedType(_))
        ));
    }

    #[test]
    fn missing_text_file_is_an_extraction_error() {
        let processor = DocumentProcessor::new(100, 20);
        let doc = Document::new(
            "gone.txt",
            DocumentType::Text,
            DocumentSource::Path("/nonexistent/gone.txt".into()),
            "chat-1",
            Value::Object(serde_json::Map::new()),
        );
        assert!(matches!(
            processor.extract_text(&doc),
            Err(ApiError::Extraction(_))
        ));
    }
}
