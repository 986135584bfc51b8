use flux_command::{headers, Command};

/// Verb of a success acknowledgment.
pub const RECEIPT: &str = "RECEIPT";
/// Verb of a rejection.
pub const ERROR: &str = "ERROR";

/// `RECEIPT` frame answering the command that carried `receipt:<id>`.
pub fn receipt_frame(receipt_id: &str) -> Command {
    Command::new(RECEIPT).with_header(headers::RECEIPT_ID, receipt_id)
}

/// `ERROR` frame for a rejected frame.
///
/// `message` is a short reason; `detail` becomes the body. The
/// `receipt-id` header is only present when the rejected command asked for
/// a receipt.
pub fn error_frame(message: &str, receipt_id: Option<&str>, detail: &str) -> Command {
    let mut frame = Command::new(ERROR).with_header(headers::MESSAGE, message);
    if let Some(id) = receipt_id {
        frame = frame.with_header(headers::RECEIPT_ID, id);
    }
    frame.with_body(detail.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_wire_format() {
        assert_eq!(
            receipt_frame("42").to_bytes().as_ref(),
            b"RECEIPT\nreceipt-id:42\n\n"
        );
    }

    #[test]
    fn error_wire_format() {
        let frame = error_frame("unknown-verb", Some("7"), "unknown effect verb \"X\"");
        assert_eq!(
            frame.to_bytes().as_ref(),
            b"ERROR\nmessage:unknown-verb\nreceipt-id:7\n\nunknown effect verb \"X\""
        );

        let frame = error_frame("malformed-frame", None, "");
        assert!(!frame.has_header(headers::RECEIPT_ID));
        assert!(frame.body().is_none());
    }

    #[test]
    fn receipt_ids_are_escaped() {
        let bytes = receipt_frame("a:b").to_bytes();
        assert_eq!(flux_command::parse(&bytes).unwrap().header("receipt-id"), Some("a:b"));
    }
}
