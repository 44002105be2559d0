// ============================================================================
// Server-Sent Events decoding
// ============================================================================
//
// Incremental decoder for `text/event-stream` bodies. Network chunks can
// split lines (and UTF-8 sequences) anywhere, so bytes are buffered until
// a full line is available. A blank line dispatches the pending event.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SseItem {
    Event { event: Option<String>, data: String },
    /// `:` comment line; servers use these as keep-alives.
    Comment,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning every item completed by it.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseItem> {
        self.buffer.extend_from_slice(chunk);
        let mut items = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(item) = self.process_line(line) {
                items.push(item);
            }
        }

        items
    }

    fn process_line(&mut self, line: &str) -> Option<SseItem> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return Some(SseItem::Comment);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id / retry carry nothing the bridge uses
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseItem> {
        if self.data.is_empty() && self.event.is_none() {
            return None;
        }
        let event = self.event.take();
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseItem::Event { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: comm").is_empty());
        assert!(decoder.feed(b"ands\ndata: {\"commands\"").is_empty());
        let items = decoder.feed(b": []}\n\n");

        assert_eq!(
            items,
            vec![SseItem::Event {
                event: Some("commands".to_string()),
                data: "{\"commands\": []}".to_string(),
            }]
        );
    }

    #[test]
    fn test_crlf_and_multiline_data() {
        let mut decoder = SseDecoder::new();
        let items = decoder.feed(b"data: first\r\ndata: second\r\n\r\n");
        assert_eq!(
            items,
            vec![SseItem::Event { event: None, data: "first\nsecond".to_string() }]
        );
    }

    #[test]
    fn test_comment_is_keepalive() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.feed(b": ping\n"), vec![SseItem::Comment]);
    }

    #[test]
    fn test_blank_lines_without_fields_are_ignored() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"\n\nid: 7\nretry: 100\n\n").is_empty());
    }

    #[test]
    fn test_multibyte_char_split_between_chunks() {
        let mut decoder = SseDecoder::new();
        let bytes = "data: é\n\n".as_bytes();
        let (head, tail) = bytes.split_at(7); // inside the two-byte é
        assert!(decoder.feed(head).is_empty());
        assert_eq!(
            decoder.feed(tail),
            vec![SseItem::Event { event: None, data: "é".to_string() }]
        );
    }
}
