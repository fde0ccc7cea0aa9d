//! Control protocol reply parsing
//!
//! Replies are one or more lines of the form `CODE SEP TEXT`, where `SEP`
//! is `-` for a mid-reply line, `+` for a data line followed by a dot-
//! terminated block, and a space for the final line.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use anon_core::error::{Error, Result};

/// One complete reply from the daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Status code of the final line
    pub code: u16,
    /// Text of every line, in order, without code and separator
    pub lines: Vec<String>,
}

impl Reply {
    /// Whether the reply reports success (2xx)
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Text of the final line, for error messages
    pub fn summary(&self) -> String {
        format!(
            "{} {}",
            self.code,
            self.lines.last().map(String::as_str).unwrap_or_default()
        )
    }

    /// Value of a `key=value` line, if present
    pub fn value(&self, key: &str) -> Option<&str> {
        self.lines.iter().find_map(|line| {
            line.strip_prefix(key)
                .and_then(|rest| rest.strip_prefix('='))
        })
    }
}

/// Read one reply from `reader`
pub async fn read_reply<R>(reader: &mut R) -> Result<Reply>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = Vec::new();

    loop {
        let line = read_line(reader).await?;
        if line.is_empty() {
            continue;
        }

        let (code, separator, text) = split_line(&line)?;
        match separator {
            ' ' => {
                lines.push(text.to_string());
                return Ok(Reply { code, lines });
            }
            '-' => lines.push(text.to_string()),
            '+' => {
                let mut data = text.to_string();
                loop {
                    let body = read_line(reader).await?;
                    if body == "." {
                        break;
                    }
                    data.push('\n');
                    data.push_str(body.strip_prefix('.').unwrap_or(&body));
                }
                lines.push(data);
            }
            other => {
                return Err(Error::control(format!(
                    "malformed reply separator {:?} in {:?}",
                    other, line
                )));
            }
        }
    }
}

async fn read_line<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .await
        .map_err(|e| Error::control(format!("failed to read response: {}", e)))?;

    if read == 0 {
        return Err(Error::control("control connection closed by daemon"));
    }

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn split_line(line: &str) -> Result<(u16, char, &str)> {
    let malformed = || Error::control(format!("malformed reply line {:?}", line));

    let code = line
        .get(..3)
        .and_then(|c| c.parse::<u16>().ok())
        .ok_or_else(malformed)?;
    let separator = line[3..].chars().next().unwrap_or(' ');
    let text = line.get(4..).unwrap_or_default();

    Ok((code, separator, text))
}
