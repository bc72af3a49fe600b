//! Interactive input collection
//!
//! Reads a pasted template up to a sentinel line and asks yes/no questions.
//! Generic over the streams so it can be driven from tests.

use std::io::{self, BufRead, Write};

use crate::config::{is_sentinel, ConfigDocument};

pub struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Collect lines until one reads `sentinel`
    ///
    /// Nothing after the sentinel is read. End of input also ends the
    /// document.
    pub fn read_until_sentinel(&mut self, sentinel: &str) -> io::Result<ConfigDocument> {
        let mut lines = Vec::new();
        let mut buf = String::new();

        loop {
            buf.clear();
            if self.input.read_line(&mut buf)? == 0 {
                tracing::warn!("Input ended before the {:?} line", sentinel);
                break;
            }

            let line = buf.strip_suffix('\n').unwrap_or(&buf);
            if is_sentinel(line, sentinel) {
                break;
            }
            lines.push(line.to_string());
        }

        tracing::debug!("Collected {} template lines", lines.len());
        Ok(ConfigDocument::from_lines(lines))
    }

    /// Ask a yes/no question until answered; an empty answer picks `default`
    pub fn confirm(&mut self, question: &str, default: bool) -> io::Result<bool> {
        let hint = if default { "[Y/n]" } else { "[y/N]" };
        let mut answer = String::new();

        loop {
            write!(self.output, "{} {} ", question, hint)?;
            self.output.flush()?;

            answer.clear();
            if self.input.read_line(&mut answer)? == 0 {
                writeln!(self.output)?;
                return Ok(default);
            }

            match answer.trim().to_ascii_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer yes or no.")?,
            }
        }
    }

    /// Print a line for the operator
    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)?;
        self.output.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn prompter(input: &str) -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    #[test]
    fn test_reads_until_sentinel() {
        let mut p = prompter("[Interface]\r\nAddress = 10.0.0.1/24\nEND\nleftover\n");
        let document = p.read_until_sentinel("END").unwrap();
        assert_eq!(document.lines(), ["[Interface]\r", "Address = 10.0.0.1/24"]);

        // The line after the sentinel is still unread
        let mut rest = String::new();
        p.input.read_line(&mut rest).unwrap();
        assert_eq!(rest, "leftover\n");
    }

    #[test]
    fn test_sentinel_with_whitespace() {
        let mut p = prompter("[Interface]\n  END \r\n");
        let document = p.read_until_sentinel("END").unwrap();
        assert_eq!(document.lines(), ["[Interface]"]);
    }

    #[test]
    fn test_eof_ends_document() {
        let mut p = prompter("[Interface]\nListenPort = 51820");
        let document = p.read_until_sentinel("END").unwrap();
        assert_eq!(document.lines(), ["[Interface]", "ListenPort = 51820"]);
    }

    #[test]
    fn test_sentinel_is_not_a_prefix_match() {
        let mut p = prompter("ENDPOINT\nEND\n");
        let document = p.read_until_sentinel("END").unwrap();
        assert_eq!(document.lines(), ["ENDPOINT"]);
    }

    #[test]
    fn test_confirm_answers() {
        assert!(prompter("y\n").confirm("Enable firewall?", false).unwrap());
        assert!(prompter("YES\n").confirm("Enable firewall?", false).unwrap());
        assert!(!prompter("n\n").confirm("Enable firewall?", true).unwrap());
        assert!(prompter("\n").confirm("Enable firewall?", true).unwrap());
        assert!(!prompter("").confirm("Enable firewall?", false).unwrap());
    }

    #[test]
    fn test_confirm_reasks_on_garbage() {
        let mut p = prompter("maybe\nno\n");
        assert!(!p.confirm("Enable firewall?", true).unwrap());

        let shown = String::from_utf8(p.output).unwrap();
        assert_eq!(
            shown,
            "Enable firewall? [Y/n] Please answer yes or no.\nEnable firewall? [Y/n] "
        );
    }
}
