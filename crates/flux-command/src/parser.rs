use bytes::Bytes;

use crate::command::Command;
use crate::error::{ParseError, Result};

/// Decode one frame into a command.
///
/// Leading line endings (heart-beats sent after a frame delimiter) are
/// skipped. Lines may end in `\n` or `\r\n`. A frame without the blank line
/// that separates headers from the body has no body.
pub fn parse(frame: &[u8]) -> Result<Command> {
    let mut rest = skip_eols(frame);
    if rest.is_empty() {
        return Err(ParseError::EmptyFrame);
    }

    let (verb_line, mut next) = split_line(rest);
    let verb = std::str::from_utf8(verb_line)
        .map_err(|_| ParseError::InvalidUtf8 { line: 1 })?
        .trim();
    if verb.is_empty() || verb.contains(':') {
        return Err(ParseError::MissingVerb);
    }

    let mut command = Command::new(verb);
    let mut line_no = 1usize;

    while let Some(remaining) = next {
        rest = remaining;
        line_no += 1;

        let (line, after) = split_line(rest);
        if line.is_empty() {
            if let Some(body) = after {
                command.set_body(Bytes::copy_from_slice(body));
            }
            break;
        }

        let (name, value) = parse_header(line, line_no)?;
        command.insert_header_if_absent(name, value);
        next = after;
    }

    Ok(command)
}

fn skip_eols(mut input: &[u8]) -> &[u8] {
    loop {
        if let Some(rest) = input.strip_prefix(b"\r\n") {
            input = rest;
        } else if let Some(rest) = input.strip_prefix(b"\n") {
            input = rest;
        } else {
            return input;
        }
    }
}

// Split off one line. The second element is `None` when the input ended
// without a line feed.
fn split_line(input: &[u8]) -> (&[u8], Option<&[u8]>) {
    match input.iter().position(|b| *b == b'\n') {
        Some(pos) => {
            let line = &input[..pos];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            (line, Some(&input[pos + 1..]))
        }
        None => (input, None),
    }
}

fn parse_header(line: &[u8], line_no: usize) -> Result<(String, String)> {
    let text =
        std::str::from_utf8(line).map_err(|_| ParseError::InvalidUtf8 { line: line_no })?;

    let (raw_name, raw_value) = match text.split_once(':') {
        Some((name, value)) if !name.is_empty() => (name, value),
        _ => {
            return Err(ParseError::MalformedHeaderLine {
                line: line_no,
                content: text.to_string(),
            })
        }
    };

    Ok((
        unescape(raw_name, line_no)?,
        unescape(raw_value, line_no)?,
    ))
}

fn unescape(raw: &str, line_no: usize) -> Result<String> {
    if !raw.contains('\\') {
        return Ok(raw.to_string());
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            Some('\\') => out.push('\\'),
            other => {
                let mut sequence = String::from('\\');
                if let Some(c) = other {
                    sequence.push(c);
                }
                return Err(ParseError::InvalidEscape {
                    line: line_no,
                    sequence,
                });
            }
        }
    }
    Ok(out)
}
