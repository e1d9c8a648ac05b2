/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Line-level parser for the shared config file grammar.
//!
//! This module produces a [`RawProfileSet`]: raw section headers mapped to raw
//! key-value pairs. Section-name validation, `profile`-prefix precedence and
//! sub-property interpretation happen later, in [`normalize`](super::normalize).

use crate::profile::parser::source::File;
use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// Characters considered to be whitespace when parsing profile files
pub(crate) const WHITESPACE: &[char] = &[' ', '\t'];

/// Characters that begin a comment
const COMMENT: &[char] = &['#', ';'];

/// Profile parse errors are always fatal: a malformed file means the user's intent
/// cannot be determined. A *missing* file, by contrast, is never an error.
#[derive(Debug, Clone)]
pub struct ProfileParseError {
    /// Location where this error occurred
    location: Location,

    /// Error message
    message: String,
}

impl Display for ProfileParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error parsing {} on line {}:\n  {}",
            self.location.path, self.location.line_number, self.message
        )
    }
}

impl Error for ProfileParseError {}

/// Location for use during error reporting
#[derive(Clone, Debug, Eq, PartialEq)]
struct Location {
    line_number: usize,
    path: String,
}

/// An unvalidated parsed profile file
///
/// Properties of a section are keyed by their lowercased name. Duplicate sections with
/// the same raw header are merged at insert time, later values winning.
pub(crate) type RawProfileSet<'a> = HashMap<&'a str, HashMap<Cow<'a, str>, Cow<'a, str>>>;

/// Parse `file` into a `RawProfileSet`
pub(crate) fn parse_profile_file(file: &File) -> Result<RawProfileSet<'_>, ProfileParseError> {
    let mut parser = Parser {
        data: HashMap::new(),
        state: State::Starting,
        location: Location {
            line_number: 0,
            path: file.path.clone(),
        },
    };
    parser.parse_profile(&file.contents)?;
    Ok(parser.data)
}

enum State<'a> {
    Starting,
    ReadingProfile {
        profile: &'a str,
        /// Lowercased key of the most recently read property, the target for
        /// continuation lines.
        property: Option<Cow<'a, str>>,
    },
}

struct Parser<'a> {
    data: RawProfileSet<'a>,
    state: State<'a>,
    location: Location,
}

impl<'a> Parser<'a> {
    fn parse_profile(&mut self, file_contents: &'a str) -> Result<(), ProfileParseError> {
        for (line_number, line) in file_contents.lines().enumerate() {
            self.location.line_number = line_number + 1;
            // Negative length line numbers are not possible so this is a fine cast
            if is_empty_line(line) || is_comment_line(line) {
                continue;
            }
            if line.starts_with(WHITESPACE) {
                self.read_continuation_line(line)?;
            } else if line.trim_matches(WHITESPACE).starts_with('[') {
                self.read_section_line(line)?;
            } else {
                self.read_property_line(line)?;
            }
        }
        Ok(())
    }

    /// Parse a property line like `a = b`
    ///
    /// A comment marker in a property line only begins a comment when it is preceded by
    /// whitespace, so `a = b#c` keeps the `#c` as literal value content.
    fn read_property_line(&mut self, line: &'a str) -> Result<(), ProfileParseError> {
        let profile = match &self.state {
            State::Starting => return Err(self.make_error("Expected a profile definition")),
            State::ReadingProfile { profile, .. } => *profile,
        };
        let (k, v) = parse_property_line(line).map_err(|err| {
            self.make_error(&format!("Expected a property definition, {}", err))
        })?;
        let properties = self
            .data
            .get_mut(profile)
            .expect("entry was created when the section was read");
        if properties.insert(k.clone(), v.into()).is_some() {
            tracing::warn!(
                key = %k,
                line = %self.location.line_number,
                "duplicate property definition, the later value was kept"
            );
        }
        self.state = State::ReadingProfile {
            profile,
            property: Some(k),
        };
        Ok(())
    }

    /// Read a continuation line
    ///
    /// A continuation line is appended to the value of the previous property joined by a
    /// newline. Comment markers in continuation lines are never stripped, so a
    /// sub-property line like `endpoint_url = http://localhost#dev` survives intact for
    /// later interpretation during normalization.
    fn read_continuation_line(&mut self, line: &'a str) -> Result<(), ProfileParseError> {
        let (profile, property) = match &self.state {
            State::Starting => return Err(self.make_error("Expected a profile definition")),
            State::ReadingProfile {
                property: None, ..
            } => {
                return Err(
                    self.make_error("Expected a property definition, found a continuation")
                )
            }
            State::ReadingProfile {
                profile,
                property: Some(property),
            } => (*profile, property.clone()),
        };
        let line = line.trim_matches(WHITESPACE);
        let current_value = self
            .data
            .get_mut(profile)
            .expect("entry was created when the section was read")
            .get_mut(&property)
            .expect("property was created when the property line was read")
            .to_mut();
        current_value.push('\n');
        current_value.push_str(line);
        Ok(())
    }

    /// Read a section line like `[profile name]`
    ///
    /// Comment markers in section lines always begin a comment, whitespace-preceded or
    /// not. The raw header between the brackets is kept as-is; validation happens during
    /// normalization so an invalid name drops the section with a warning instead of
    /// failing the parse.
    fn read_section_line(&mut self, line: &'a str) -> Result<(), ProfileParseError> {
        let line = match line.find(COMMENT) {
            Some(idx) => &line[..idx],
            None => line,
        };
        let line = line.trim_matches(WHITESPACE);
        debug_assert!(line.starts_with('['));
        let closing_bracket = line
            .find(']')
            .ok_or_else(|| self.make_error("Profile definition must end with ']'"))?;
        if !line[closing_bracket + 1..].trim_matches(WHITESPACE).is_empty() {
            return Err(self.make_error("Unexpected tokens after the closing ']' of a profile definition"));
        }
        let section_key = line[1..closing_bracket].trim_matches(WHITESPACE);
        self.data.entry(section_key).or_default();
        self.state = State::ReadingProfile {
            profile: section_key,
            property: None,
        };
        Ok(())
    }

    fn make_error(&self, message: &str) -> ProfileParseError {
        ProfileParseError {
            location: self.location.clone(),
            message: message.into(),
        }
    }
}

enum PropertyError {
    NoEquals,
    NoName,
}

impl Display for PropertyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PropertyError::NoEquals => write!(f, "property did not contain a `=`"),
            PropertyError::NoName => write!(f, "property did not have a name"),
        }
    }
}

/// Parse a property line into a key-value pair
fn parse_property_line(line: &str) -> Result<(Cow<'_, str>, &str), PropertyError> {
    let line = strip_trailing_comment(line);
    let (k, v) = line.split_once('=').ok_or(PropertyError::NoEquals)?;
    let k = k.trim_matches(WHITESPACE);
    let v = v.trim_matches(WHITESPACE);
    if k.is_empty() {
        return Err(PropertyError::NoName);
    }
    Ok((to_ascii_lowercase(k), v))
}

/// Truncate `line` at the first comment marker preceded by whitespace
fn strip_trailing_comment(line: &str) -> &str {
    let mut prev_char_whitespace = false;
    for (idx, chr) in line.char_indices() {
        if prev_char_whitespace && COMMENT.contains(&chr) {
            return &line[..idx];
        }
        prev_char_whitespace = WHITESPACE.contains(&chr);
    }
    line
}

pub(crate) fn to_ascii_lowercase(s: &str) -> Cow<'_, str> {
    if s.bytes().any(|b| b.is_ascii_uppercase()) {
        Cow::Owned(s.to_ascii_lowercase())
    } else {
        Cow::Borrowed(s)
    }
}

fn is_empty_line(line: &str) -> bool {
    line.trim_matches(WHITESPACE).is_empty()
}

fn is_comment_line(line: &str) -> bool {
    line.trim_matches(WHITESPACE).starts_with(COMMENT)
}

#[cfg(test)]
mod test {
    use super::parse_profile_file;
    use crate::profile::parser::source::File;
    use std::borrow::Cow;
    use tracing_test::traced_test;

    fn parse(contents: &str) -> Result<(), String> {
        let file = File {
            path: "~/.aws/config".into(),
            contents: contents.into(),
        };
        parse_profile_file(&file)
            .map(|_| ())
            .map_err(|err| err.to_string())
    }

    #[test]
    fn empty_input_parses_to_empty_set() {
        let file = File {
            path: "test".into(),
            contents: "".into(),
        };
        assert!(parse_profile_file(&file).unwrap().is_empty());
    }

    #[test]
    fn unterminated_section_is_fatal_with_line_number() {
        let err = parse("[default]\nk = v\n[unterminated").expect_err("missing bracket");
        assert!(err.contains("must end with ']'"), "{}", err);
        assert!(err.contains("line 3"), "{}", err);
    }

    #[test]
    fn property_without_equals_is_fatal() {
        let err = parse("[default]\nkey").expect_err("no equals");
        assert!(err.contains("property did not contain a `=`"), "{}", err);
        assert!(err.contains("line 2"), "{}", err);
    }

    #[test]
    fn property_without_name_is_fatal() {
        let err = parse("[default]\n= value").expect_err("no name");
        assert!(err.contains("property did not have a name"), "{}", err);
    }

    #[test]
    fn property_before_any_section_is_fatal() {
        let err = parse("key = value").expect_err("no section");
        assert!(err.contains("Expected a profile definition"), "{}", err);
        assert!(err.contains("line 1"), "{}", err);
    }

    #[test]
    fn continuation_without_property_is_fatal() {
        let err = parse("[default]\n  continued").expect_err("no property");
        assert!(
            err.contains("Expected a property definition, found a continuation"),
            "{}",
            err
        );
    }

    #[test]
    fn tokens_after_closing_bracket_are_fatal() {
        let err = parse("[default] junk").expect_err("junk after bracket");
        assert!(err.contains("Unexpected tokens"), "{}", err);
    }

    #[test]
    fn section_line_comments_need_no_whitespace() {
        let file = File {
            path: "test".into(),
            contents: "[default]; comment\nk = v".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(raw["default"].get("k"), Some(&Cow::Borrowed("v")));
    }

    #[test]
    fn property_value_comments_require_whitespace() {
        let file = File {
            path: "test".into(),
            contents: "[default]\na = b#keeps ; this\nc = d ;dropped".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(raw["default"].get("a"), Some(&Cow::Borrowed("b#keeps ; this")));
        assert_eq!(raw["default"].get("c"), Some(&Cow::Borrowed("d")));
    }

    #[test]
    fn continuation_keeps_comment_markers() {
        let file = File {
            path: "test".into(),
            contents: "[default]\na = b\n  continued # not a comment".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(
            raw["default"].get("a").map(|v| v.as_ref()),
            Some("b\ncontinued # not a comment")
        );
    }

    #[test]
    fn sub_properties_accumulate_under_empty_parent() {
        let file = File {
            path: "test".into(),
            contents: "[services foo]\ns3 =\n  endpoint_url = http://localhost:3000\n  setting_a = foo".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(
            raw["services foo"].get("s3").map(|v| v.as_ref()),
            Some("\nendpoint_url = http://localhost:3000\nsetting_a = foo")
        );
    }

    #[test]
    fn keys_are_lowercased_and_later_duplicates_win() {
        let file = File {
            path: "test".into(),
            contents: "[default]\nKEY = first\nkey = second".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(raw["default"].get("key"), Some(&Cow::Borrowed("second")));
        assert_eq!(raw["default"].len(), 1);
    }

    #[test]
    #[traced_test]
    fn duplicate_property_logs_warning() {
        let file = File {
            path: "test".into(),
            contents: "[default]\nk = a\nk = b".into(),
        };
        let _ = parse_profile_file(&file).unwrap();
        assert!(logs_contain("duplicate property definition"));
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        let file = File {
            path: "test".into(),
            contents: "\n# comment\n; also comment\n   \n[default]\nk = v\n".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert_eq!(raw["default"].get("k"), Some(&Cow::Borrowed("v")));
    }

    #[test]
    fn empty_section_is_retained() {
        let file = File {
            path: "test".into(),
            contents: "[profile foo]".into(),
        };
        let raw = parse_profile_file(&file).unwrap();
        assert!(raw.contains_key("profile foo"));
        assert!(raw["profile foo"].is_empty());
    }
}
