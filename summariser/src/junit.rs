use std::collections::HashMap;
use std::path::Path;

/// Whether every test in a JUnit style result file was skipped.
///
/// Compares the `tests` and `skipped` attributes of the root element as written, a missing
/// attribute reads as empty. Returns an error when the root element cannot be read, callers treat
/// such files as unusable.
pub fn all_tests_were_skipped(path: &Path) -> std::io::Result<bool> {
    let content = std::fs::read_to_string(path)?;
    let attributes = root_attributes(&content).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("No root element in {}", path.display()),
        )
    })?;

    let get = |name: &str| attributes.get(name).map(String::as_str).unwrap_or_default();
    Ok(get("tests") == get("skipped"))
}

/// Attributes of the first element in an XML document, skipping the prolog, comments and
/// doctype.
fn root_attributes(content: &str) -> Option<HashMap<String, String>> {
    let mut rest = content;
    loop {
        let start = rest.find('<')?;
        rest = &rest[start..];
        if rest.starts_with("<?") {
            rest = &rest[rest.find("?>")? + 2..];
        } else if rest.starts_with("<!--") {
            rest = &rest[rest.find("-->")? + 3..];
        } else if rest.starts_with("<!") {
            rest = &rest[rest.find('>')? + 1..];
        } else {
            break;
        }
    }

    let end = tag_end(rest)?;
    let tag = rest[1..end].trim_end_matches('/');
    let name_end = tag
        .find(|c: char| c.is_whitespace())
        .unwrap_or(tag.len());
    if name_end == 0 {
        return None;
    }

    parse_attributes(&tag[name_end..])
}

/// Index of the `>` closing the tag at the start of `input`. A `>` inside a quoted attribute value
/// does not close the tag.
fn tag_end(input: &str) -> Option<usize> {
    let mut quote = None;
    for (index, c) in input.char_indices() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (None, '>') => return Some(index),
            (Some(open), c) if c == open => quote = None,
            _ => {}
        }
    }
    None
}

fn parse_attributes(mut input: &str) -> Option<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    loop {
        input = input.trim_start();
        if input.is_empty() {
            return Some(attributes);
        }

        let eq = input.find('=')?;
        let name = input[..eq].trim();
        input = input[eq + 1..].trim_start();

        let quote = input.chars().next().filter(|c| *c == '"' || *c == '\'')?;
        input = &input[1..];
        let close = input.find(quote)?;
        attributes.insert(name.to_string(), unescape(&input[..close]));
        input = &input[close + 1..];
    }
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn all_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "TEST-a.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- generated -->
<testsuite name="org.example.A" tests="5" skipped="5" failures="0">
  <testcase name="one"><skipped/></testcase>
</testsuite>"#,
        );
        assert!(all_tests_were_skipped(&path).unwrap());
    }

    #[test]
    fn some_executed() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "TEST-b.xml",
            "<testsuite tests='5' skipped='4'></testsuite>",
        );
        assert!(!all_tests_were_skipped(&path).unwrap());
    }

    #[test]
    fn missing_attributes_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "TEST-c.xml", "<testsuite/>");
        assert!(all_tests_were_skipped(&path).unwrap());
    }

    #[test]
    fn unreadable_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "TEST-d.xml", "not xml at all");
        assert!(all_tests_were_skipped(&path).is_err());

        let path = write(dir.path(), "TEST-e.xml", "<testsuite tests=\"5 skipped=\"5\">");
        assert!(all_tests_were_skipped(&path).is_err());
    }

    #[test]
    fn angle_bracket_in_attribute_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "TEST-f.xml",
            r#"<testsuite name="a > b" tests="5" skipped="4"><testcase name='x > y'/></testsuite>"#,
        );
        assert!(!all_tests_were_skipped(&path).unwrap());

        let path = write(
            dir.path(),
            "TEST-g.xml",
            "<testsuite name='a > b' tests=\"5\" skipped=\"5\"/>",
        );
        assert!(all_tests_were_skipped(&path).unwrap());
    }

    #[test]
    fn parses_escaped_values() {
        let attributes =
            root_attributes(r#"<testsuite name="a &amp; b" tests="1"/>"#).unwrap();
        assert_eq!("a & b", attributes["name"]);
        assert_eq!("1", attributes["tests"]);
    }
}
