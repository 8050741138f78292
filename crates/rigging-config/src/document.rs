//! Multi-document YAML stream splitting.
//!
//! Documents are kept as raw text together with the separator that preceded
//! them so a stream can be rewritten document by document and joined back
//! without disturbing the documents that were left alone.

/// One document of a YAML stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// The `---` separator text that introduced this document, `None` for the
    /// implicit first document.
    pub separator: Option<String>,
    pub body: String,
    /// 1-based line of the first line with content, `None` when the document
    /// holds nothing but blanks and comments.
    pub line: Option<usize>,
}

impl RawDocument {
    pub fn is_empty(&self) -> bool {
        self.line.is_none()
    }

    /// Swap the body for rewritten text. An inline separator (`--- {...}`)
    /// becomes a separator line of its own.
    pub fn replace_body(&mut self, body: String) {
        if let Some(separator) = &self.separator {
            if !separator.ends_with('\n') {
                self.separator = Some("---\n".to_string());
            }
        }
        self.body = body;
    }
}

fn is_content(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#')
}

/// Split `text` into documents at `---` separator lines.
pub fn split_documents(text: &str) -> Vec<RawDocument> {
    let mut documents = Vec::new();
    let mut current = RawDocument {
        separator: None,
        body: String::new(),
        line: None,
    };

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let number = index + 1;

        if let Some(rest) = line.strip_prefix("---") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                documents.push(current);

                let inline = rest.trim_start();
                let (separator, body) = if inline.is_empty() {
                    (line.to_string(), String::new())
                } else {
                    let split = line.len() - inline.len();
                    (line[..split].to_string(), inline.to_string())
                };
                current = RawDocument {
                    line: is_content(&body).then_some(number),
                    separator: Some(separator),
                    body,
                };
                continue;
            }
        }

        if current.line.is_none() && is_content(line) {
            current.line = Some(number);
        }
        current.body.push_str(line);
    }

    documents.push(current);
    documents
}

/// Join documents back into a single stream.
pub fn join_documents(documents: &[RawDocument]) -> String {
    let mut text = String::new();
    for document in documents {
        if let Some(separator) = &document.separator {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(separator);
        }
        text.push_str(&document.body);
    }
    text
}
