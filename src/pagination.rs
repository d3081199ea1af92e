//! Continuation tokens.
//!
//! The host hands back whatever string the previous page returned, possibly
//! to a different connector instance, so every bit of state a walk needs is
//! serialized into the token. An empty token means "start" on the way in and
//! "done" on the way out.
use serde::{Deserialize, Serialize};

use crate::errors::{SnowflakeError, SnowflakeResult};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageToken {
    /// Last key seen by a `LIMIT n FROM '<key>'` listing
    Flat { cursor: String },
    /// Rows already read from a `RESULT_SCAN` listing
    Offset { offset: usize },
    /// Scopes still to walk, the top of the stack last
    Nested { frames: Vec<Frame> },
}

/// One scope of a nested walk
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub scope: String,
    /// Whether the parent database is shared or system owned
    #[serde(default)]
    pub shared: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

impl Frame {
    pub fn new(scope: &str, shared: bool) -> Frame {
        Frame {
            scope: scope.to_owned(),
            shared,
            cursor: None,
        }
    }
}

impl PageToken {
    /// `""` is no token
    pub fn parse(token: &str) -> SnowflakeResult<Option<PageToken>> {
        if token.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(token)
            .map(Some)
            .map_err(|err| SnowflakeError::InvalidPageToken(format!("{token:?}: {err}")))
    }

    pub fn encode(&self) -> SnowflakeResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// The cursor of a flat listing
    pub fn cursor(token: &str) -> SnowflakeResult<Option<String>> {
        match Self::parse(token)? {
            None => Ok(None),
            Some(PageToken::Flat { cursor }) => Ok(Some(cursor)),
            Some(_) => Err(SnowflakeError::InvalidPageToken(format!("{token:?} is not a cursor"))),
        }
    }

    /// The offset of a `RESULT_SCAN` listing
    pub fn offset(token: &str) -> SnowflakeResult<usize> {
        match Self::parse(token)? {
            None => Ok(0),
            Some(PageToken::Offset { offset }) => Ok(offset),
            Some(_) => Err(SnowflakeError::InvalidPageToken(format!("{token:?} is not an offset"))),
        }
    }

    /// The token after a flat page: the last key when the page was full, else done
    pub fn after_flat(page_len: usize, limit: usize, last_key: Option<&str>) -> SnowflakeResult<String> {
        match last_key {
            Some(key) if is_full(page_len, limit) => PageToken::Flat {
                cursor: key.to_owned(),
            }
            .encode(),
            _ => Ok(String::new()),
        }
    }

    /// The token after an offset page
    pub fn after_offset(page_len: usize, limit: usize, offset: usize) -> SnowflakeResult<String> {
        if is_full(page_len, limit) {
            PageToken::Offset {
                offset: offset + limit,
            }
            .encode()
        } else {
            Ok(String::new())
        }
    }
}

/// A page that came back short was the last one
pub fn is_full(page_len: usize, limit: usize) -> bool {
    limit > 0 && page_len >= limit
}

/// A stack of scopes for a nested walk.
///
/// Frames are processed LIFO. After each page the top frame is popped and,
/// when its scope has more rows, pushed back with the new cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bag {
    frames: Vec<Frame>,
}

impl Bag {
    pub fn from_token(token: &str) -> SnowflakeResult<Bag> {
        match PageToken::parse(token)? {
            None => Ok(Bag::default()),
            Some(PageToken::Nested { frames }) => Ok(Bag { frames }),
            Some(_) => Err(SnowflakeError::InvalidPageToken(format!(
                "{token:?} is not a nested token"
            ))),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// The frame to walk next
    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Drop the current frame, its scope exhausted
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Finish the current frame's page and produce the next token.
    ///
    /// `cursor` is where the current scope continues, `None` once it is exhausted.
    pub fn next_token(mut self, cursor: Option<String>) -> SnowflakeResult<String> {
        if let Some(frame) = self.frames.pop() {
            if cursor.is_some() {
                self.frames.push(Frame { cursor, ..frame });
            }
        }
        if self.frames.is_empty() {
            return Ok(String::new());
        }
        PageToken::Nested {
            frames: self.frames,
        }
        .encode()
    }
}

/// One page of a listing and the token for the next one (`""` when done)
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: String,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Page<T> {
        Page {
            items,
            next_token: String::new(),
        }
    }

    pub fn is_last(&self) -> bool {
        self.next_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_token_is_start() -> SnowflakeResult<()> {
        assert_eq!(PageToken::parse("")?, None);
        assert_eq!(PageToken::cursor("")?, None);
        assert_eq!(PageToken::offset("")?, 0);
        assert!(Bag::from_token("")?.is_empty());
        Ok(())
    }

    #[test]
    fn flat_cursor_only_when_full() -> SnowflakeResult<()> {
        assert_eq!(PageToken::after_flat(1, 2, Some("B"))?, "");
        let token = PageToken::after_flat(2, 2, Some("B"))?;
        assert_eq!(PageToken::cursor(&token)?, Some("B".into()));
        assert_eq!(PageToken::after_flat(0, 2, None)?, "");
        Ok(())
    }

    #[test]
    fn offsets_advance_by_limit() -> SnowflakeResult<()> {
        let token = PageToken::after_offset(50, 50, 100)?;
        assert_eq!(PageToken::offset(&token)?, 150);
        assert_eq!(PageToken::after_offset(49, 50, 100)?, "");
        Ok(())
    }

    #[test]
    fn wrong_variant_is_rejected() -> SnowflakeResult<()> {
        let offset = PageToken::Offset { offset: 5 }.encode()?;
        assert!(matches!(
            PageToken::cursor(&offset),
            Err(SnowflakeError::InvalidPageToken(_))
        ));
        assert!(Bag::from_token(&offset).is_err());
        assert!(PageToken::parse("not json").is_err());
        Ok(())
    }

    #[test]
    fn bag_walks_lifo_and_drains() -> SnowflakeResult<()> {
        let mut bag = Bag::default();
        bag.push(Frame::new("B", true));
        bag.push(Frame::new("A", true));
        assert_eq!(bag.current().map(|f| f.scope.as_str()), Some("A"));

        // A has another page
        let token = bag.next_token(Some("t1".into()))?;
        let bag = Bag::from_token(&token)?;
        let top = bag.current().cloned().unwrap();
        assert_eq!(top.scope, "A");
        assert_eq!(top.cursor.as_deref(), Some("t1"));
        assert!(top.shared);

        // A is exhausted, B comes next
        let token = bag.next_token(None)?;
        let bag = Bag::from_token(&token)?;
        assert_eq!(bag.current().map(|f| f.scope.as_str()), Some("B"));
        assert_eq!(bag.current().and_then(|f| f.cursor.clone()), None);

        assert_eq!(bag.next_token(None)?, "");
        Ok(())
    }
}
