//! CSV rendering for exports

/// Quote a field when it contains a delimiter, quote or line break
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a header line plus rows, CRLF-terminated
pub fn to_csv<H, R, F>(headers: &[H], rows: R) -> String
where
    H: AsRef<str>,
    R: IntoIterator<Item = Vec<F>>,
    F: AsRef<str>,
{
    let mut out = String::new();
    push_line(&mut out, headers.iter().map(|h| h.as_ref()));
    for row in rows {
        push_line(&mut out, row.iter().map(|f| f.as_ref()));
    }
    out
}

fn push_line<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    let line = fields.map(escape_field).collect::<Vec<_>>().join(",");
    out.push_str(&line);
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("Lovelace, Ada"), "\"Lovelace, Ada\"");
        assert_eq!(escape_field("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_field("two\nlines"), "\"two\nlines\"");
        assert_eq!(escape_field(""), "");
    }

    #[test]
    fn test_to_csv() {
        let csv = to_csv(
            &["code", "name"],
            vec![
                vec!["EMP-0001".to_string(), "Ada".to_string()],
                vec!["EMP-0002".to_string(), "Hopper, Grace".to_string()],
            ],
        );
        assert_eq!(csv, "code,name\r\nEMP-0001,Ada\r\nEMP-0002,\"Hopper, Grace\"\r\n");
    }

    #[test]
    fn test_header_only() {
        let rows: Vec<Vec<String>> = vec![];
        assert_eq!(to_csv(&["a", "b"], rows), "a,b\r\n");
    }

    /// Minimal RFC 4180 reader for one record
    fn parse_record(line: &str) -> Vec<String> {
        let mut fields = vec![String::new()];
        let mut quoted = false;
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match (c, quoted) {
                ('"', true) if chars.peek() == Some(&'"') => {
                    chars.next();
                    fields.last_mut().unwrap().push('"');
                }
                ('"', _) => quoted = !quoted,
                (',', false) => fields.push(String::new()),
                (c, _) => fields.last_mut().unwrap().push(c),
            }
        }
        fields
    }

    proptest! {
        #[test]
        fn escaped_fields_parse_back(fields in prop::collection::vec("[a-z,\" \n]{0,8}", 1..5)) {
            let line = fields.iter().map(|f| escape_field(f)).collect::<Vec<_>>().join(",");
            prop_assert_eq!(parse_record(&line), fields);
        }
    }
}
