//! Template merge engine
//!
//! Takes a user supplied WireGuard template, injects a generated private key
//! and produces the normalized text that gets installed. The merge never
//! touches the filesystem; persisting the result is up to the caller.

use std::fmt;

use serde::Serialize;

use crate::error::StructuralError;

/// Section header every template must carry exactly once
pub const INTERFACE_HEADER: &str = "[Interface]";

/// Marker replaced by the generated private key
pub const DEFAULT_PLACEHOLDER: &str = "REPLACE_ME";

/// Assignment key that holds the private key
pub const DEFAULT_KEY_FIELD: &str = "PrivateKey";

/// Line the operator types to finish pasting a template
pub const DEFAULT_SENTINEL: &str = "END";

/// Raw template lines as supplied by the operator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigDocument {
    lines: Vec<String>,
}

/// Merged and whitespace-normalized configuration, ready for installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    lines: Vec<String>,
}

/// How the private key is injected into a template
///
/// The variants are tried in declaration order and the first one that
/// applies wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderPolicy {
    /// Every occurrence of the placeholder token is replaced
    ReplacePlaceholder,
    /// The value of the existing key assignment is replaced
    ReplaceAssignment,
    /// A new assignment is inserted right after the `[Interface]` header
    InsertAfterHeader,
}

/// Result of a merge along with the injection branch that ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub document: NormalizedDocument,
    pub policy: PlaceholderPolicy,
}

/// Injects secrets into templates
#[derive(Debug, Clone)]
pub struct ConfigMerger {
    placeholder: String,
    key_field: String,
}

impl ConfigDocument {
    /// Build a document from already collected lines
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Split text into lines, stopping at the sentinel line if one is given
    pub fn from_text(text: &str, sentinel: Option<&str>) -> Self {
        let lines = text
            .split('\n')
            .take_while(|line| sentinel.map_or(true, |s| !is_sentinel(line, s)))
            .map(str::to_string)
            .collect::<Vec<_>>();
        Self::from_lines(trim_final_empty(lines))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Look up an assignment value, see [`extract_field`]
    pub fn extract_field(&self, field: &str) -> Option<String> {
        extract_field(&self.lines, field)
    }

    /// Index of the single `[Interface]` header line
    fn interface_header(&self) -> Result<usize, StructuralError> {
        let mut headers = self
            .lines
            .iter()
            .enumerate()
            .filter(|(_, line)| is_interface_header(line))
            .map(|(index, _)| index);

        let first = headers.next().ok_or_else(|| StructuralError::MissingSection {
            section: INTERFACE_HEADER.to_string(),
        })?;

        let extra = headers.count();
        if extra > 0 {
            return Err(StructuralError::DuplicateSection {
                section: INTERFACE_HEADER.to_string(),
                count: extra + 1,
            });
        }

        Ok(first)
    }
}

impl NormalizedDocument {
    /// Normalize every line: trailing carriage returns, spaces and tabs go
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            lines: lines
                .into_iter()
                .map(|line| normalize_line(line.as_ref()).to_string())
                .collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Look up an assignment value, see [`extract_field`]
    pub fn extract_field(&self, field: &str) -> Option<String> {
        extract_field(&self.lines, field)
    }

    /// Render as file contents, one `\n` after every line
    pub fn to_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for NormalizedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl PlaceholderPolicy {
    /// Pick the injection branch for a template
    pub fn select<S: AsRef<str>>(lines: &[S], placeholder: &str, key_field: &str) -> Self {
        if !placeholder.is_empty() && lines.iter().any(|line| line.as_ref().contains(placeholder)) {
            Self::ReplacePlaceholder
        } else if find_assignment(lines, key_field).is_some() {
            Self::ReplaceAssignment
        } else {
            Self::InsertAfterHeader
        }
    }
}

impl Default for ConfigMerger {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER, DEFAULT_KEY_FIELD)
    }
}

impl ConfigMerger {
    pub fn new(placeholder: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            key_field: key_field.into(),
        }
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    /// Validate the template, inject `secret` and normalize the result
    pub fn merge(
        &self,
        document: &ConfigDocument,
        secret: &str,
    ) -> Result<NormalizedDocument, StructuralError> {
        self.merge_with_policy(document, secret)
            .map(|merged| merged.document)
    }

    /// Same as [`merge`](Self::merge), also reporting which branch ran
    pub fn merge_with_policy(
        &self,
        document: &ConfigDocument,
        secret: &str,
    ) -> Result<Merged, StructuralError> {
        debug_assert!(!secret.is_empty(), "secret must not be empty");

        let header = document.interface_header()?;
        let policy = PlaceholderPolicy::select(&document.lines, &self.placeholder, &self.key_field);
        let mut lines = document.lines.clone();

        match policy {
            PlaceholderPolicy::ReplacePlaceholder => {
                for line in lines.iter_mut() {
                    if line.contains(self.placeholder.as_str()) {
                        *line = line.replace(self.placeholder.as_str(), secret);
                    }
                }
            }
            PlaceholderPolicy::ReplaceAssignment => {
                if let Some(index) = find_assignment(&lines, &self.key_field) {
                    let indent = leading_whitespace(&lines[index]).to_string();
                    lines[index] = format!("{}{} = {}", indent, self.key_field, secret);
                }
            }
            PlaceholderPolicy::InsertAfterHeader => {
                lines.insert(header + 1, format!("{} = {}", self.key_field, secret));
            }
        }

        tracing::debug!(policy = ?policy, lines = lines.len(), "Merged template");

        Ok(Merged {
            document: NormalizedDocument::from_lines(lines),
            policy,
        })
    }
}

/// Find the first `<field> = value` line and return the value
///
/// All whitespace is removed from the value. A missing field or an empty
/// value yields `None`; this never fails.
pub fn extract_field<S: AsRef<str>>(lines: &[S], field: &str) -> Option<String> {
    if field.is_empty() {
        return None;
    }

    lines
        .iter()
        .find_map(|line| assignment_value(line.as_ref(), field))
        .map(|value| value.chars().filter(|c| !c.is_whitespace()).collect::<String>())
        .filter(|value| !value.is_empty())
}

/// Strip line ending leftovers and trailing blanks from a single line
pub fn normalize_line(line: &str) -> &str {
    line.trim_end_matches(['\r', ' ', '\t'])
}

/// Whether `line` is the `[Interface]` header, ignoring surrounding whitespace
pub fn is_interface_header(line: &str) -> bool {
    line.trim() == INTERFACE_HEADER
}

pub fn is_sentinel(line: &str, sentinel: &str) -> bool {
    line.trim() == sentinel
}

fn find_assignment<S: AsRef<str>>(lines: &[S], field: &str) -> Option<usize> {
    if field.is_empty() {
        return None;
    }
    lines
        .iter()
        .position(|line| assignment_value(line.as_ref(), field).is_some())
}

fn assignment_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(field)?;
    rest.trim_start().strip_prefix('=')
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

// Text ending in '\n' splits into a trailing empty element that is not a line
fn trim_final_empty(mut lines: Vec<String>) -> Vec<String> {
    if lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merge(input: &str, secret: &str) -> Result<String, StructuralError> {
        let document = ConfigDocument::from_text(input, None);
        ConfigMerger::default()
            .merge(&document, secret)
            .map(|doc| doc.to_text())
    }

    #[test]
    fn test_placeholder_is_replaced() {
        let output = merge("[Interface]\nPrivateKey = REPLACE_ME\n", "ABC123").unwrap();
        assert_eq!(output, "[Interface]\nPrivateKey = ABC123\n");
    }

    #[test]
    fn test_existing_assignment_is_replaced() {
        let output = merge("[Interface]\nPrivateKey = oldvalue\n", "XYZ789").unwrap();
        assert_eq!(output, "[Interface]\nPrivateKey = XYZ789\n");
    }

    #[test]
    fn test_key_inserted_after_header() {
        let output = merge("[Interface]\nAddress = 10.0.0.1/24\n", "K1").unwrap();
        assert_eq!(output, "[Interface]\nPrivateKey = K1\nAddress = 10.0.0.1/24\n");
    }

    #[test]
    fn test_missing_interface_section() {
        let result = merge("[Peer]\nPublicKey = xyz\n", "K1");
        assert_eq!(
            result,
            Err(StructuralError::MissingSection {
                section: "[Interface]".to_string()
            })
        );
    }

    #[test]
    fn test_header_variants_are_rejected() {
        for input in [
            "[interface]\nAddress = 10.0.0.1/24\n",
            "[INTERFACE]\n",
            "[ Interface ]\n",
            "# [Interface]\n",
            "[Interface] # main\n",
            "",
        ] {
            assert!(
                matches!(merge(input, "K1"), Err(StructuralError::MissingSection { .. })),
                "accepted {:?}",
                input
            );
        }
    }

    #[test]
    fn test_header_with_surrounding_whitespace_is_accepted() {
        let output = merge("  [Interface]\t\nAddress = 10.0.0.1/24\n", "K1").unwrap();
        assert_eq!(output, "  [Interface]\nPrivateKey = K1\nAddress = 10.0.0.1/24\n");
    }

    #[test]
    fn test_duplicate_interface_section() {
        let result = merge("[Interface]\nAddress = 10.0.0.1/24\n[Interface]\n", "K1");
        assert_eq!(
            result,
            Err(StructuralError::DuplicateSection {
                section: "[Interface]".to_string(),
                count: 2
            })
        );
    }

    #[test]
    fn test_placeholder_takes_precedence_over_assignment() {
        let input = "[Interface]\nPrivateKey = oldvalue\nAddress = REPLACE_ME\n";
        let document = ConfigDocument::from_text(input, None);
        let merged = ConfigMerger::default()
            .merge_with_policy(&document, "SECRET")
            .unwrap();

        assert_eq!(merged.policy, PlaceholderPolicy::ReplacePlaceholder);
        assert_eq!(
            merged.document.to_text(),
            "[Interface]\nPrivateKey = oldvalue\nAddress = SECRET\n"
        );
    }

    #[test]
    fn test_every_placeholder_occurrence_is_replaced() {
        let output = merge(
            "[Interface]\nPrivateKey = REPLACE_ME\n# REPLACE_ME REPLACE_ME\n",
            "K",
        )
        .unwrap();
        assert_eq!(output, "[Interface]\nPrivateKey = K\n# K K\n");
    }

    #[test]
    fn test_only_first_assignment_is_replaced() {
        let output = merge(
            "[Interface]\n\tPrivateKey=old\n[Peer]\nPrivateKey = other\n",
            "NEW",
        )
        .unwrap();
        assert_eq!(output, "[Interface]\n\tPrivateKey = NEW\n[Peer]\nPrivateKey = other\n");
    }

    #[test]
    fn test_similar_key_names_do_not_match() {
        let document = ConfigDocument::from_text("[Interface]\nPrivateKeyFile = /tmp/k\n", None);
        let merged = ConfigMerger::default()
            .merge_with_policy(&document, "K1")
            .unwrap();
        assert_eq!(merged.policy, PlaceholderPolicy::InsertAfterHeader);
        assert_eq!(
            merged.document.to_text(),
            "[Interface]\nPrivateKey = K1\nPrivateKeyFile = /tmp/k\n"
        );
    }

    #[test]
    fn test_custom_placeholder_and_field() {
        let merger = ConfigMerger::new("<<KEY>>", "PrivateKey");
        let document = ConfigDocument::from_text("[Interface]\nPrivateKey = <<KEY>>\n", None);
        let output = merger.merge(&document, "abc").unwrap();
        assert_eq!(output.to_text(), "[Interface]\nPrivateKey = abc\n");
    }

    #[test]
    fn test_normalization_strips_line_endings_and_trailing_blanks() {
        let output = merge(
            "[Interface]\r\nAddress = 10.0.0.1/24 \t\r\n\r\n  ListenPort = 51820\n",
            "K1",
        )
        .unwrap();
        assert_eq!(
            output,
            "[Interface]\nPrivateKey = K1\nAddress = 10.0.0.1/24\n\n  ListenPort = 51820\n"
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = ["a \r", "b\t\r \r", "  c  ", "", "\r", "d = e , f\t"];
        let once = NormalizedDocument::from_lines(inputs);
        let twice = NormalizedDocument::from_lines(once.lines());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_values_with_commas_stay_opaque() {
        let output = merge(
            "[Interface]\nAddress = 10.0.0.1/24, fd00::1/64\n",
            "K1",
        )
        .unwrap();
        assert!(output.contains("Address = 10.0.0.1/24, fd00::1/64\n"));
    }

    #[test]
    fn test_extract_field() {
        let document = ConfigDocument::from_text("[Interface]\nListenPort = 51820\n", None);
        assert_eq!(document.extract_field("ListenPort"), Some("51820".to_string()));
    }

    #[test]
    fn test_extract_field_absent() {
        let document = ConfigDocument::from_text("[Interface]\nAddress = 10.0.0.1/24\n", None);
        assert_eq!(document.extract_field("ListenPort"), None);
        assert_eq!(document.extract_field(""), None);
        assert_eq!(ConfigDocument::default().extract_field("ListenPort"), None);
    }

    #[test]
    fn test_extract_field_details() {
        let lines = [
            "# ListenPort = 1",
            "listenport = 2",
            "  ListenPort=  5 18 20 ",
            "ListenPort = 9",
        ];
        assert_eq!(extract_field(&lines, "ListenPort"), Some("51820".to_string()));
        assert_eq!(extract_field(&["ListenPort ="], "ListenPort"), None);
    }

    #[test]
    fn test_from_text_stops_at_sentinel() {
        let document = ConfigDocument::from_text(
            "[Interface]\nAddress = 10.0.0.1/24\n END \n[Peer]\n",
            Some("END"),
        );
        assert_eq!(document.lines(), ["[Interface]", "Address = 10.0.0.1/24"]);
    }

    #[test]
    fn test_from_text_keeps_inner_blank_lines() {
        let document = ConfigDocument::from_text("[Interface]\n\n\nA = 1\n", None);
        assert_eq!(document.lines(), ["[Interface]", "", "", "A = 1"]);
    }
}
