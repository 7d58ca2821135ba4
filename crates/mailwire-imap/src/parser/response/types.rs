//! Response types.

use crate::types::{Condition, ResponseCode, Status, Tag, Value};

/// One decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseLine {
    /// Untagged response (`* ...`): server data or a status condition.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation {
        /// Text following the `+`, possibly empty.
        text: String,
    },
    /// Tagged completion of a command.
    Tagged(TaggedCompletion),
}

impl ResponseLine {
    /// Returns the tag if this is a completion.
    #[must_use]
    pub const fn tag(&self) -> Option<&Tag> {
        match self {
            Self::Tagged(completion) => Some(&completion.tag),
            _ => None,
        }
    }
}

/// Untagged response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// Status condition: `* OK`, `* NO`, `* BAD`, `* PREAUTH`, `* BYE`.
    Condition {
        /// The condition keyword.
        condition: Condition,
        /// Optional bracketed response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Any other data: `* CAPABILITY ...`, `* 3 EXISTS`, `* 1 FETCH (...)`.
    Data {
        /// Leading number for message data (`* 3 EXISTS`).
        number: Option<u32>,
        /// Keyword, as sent.
        keyword: String,
        /// Everything after the keyword.
        values: Vec<Value>,
    },
}

impl UntaggedResponse {
    /// Returns the response keyword (`EXISTS`, `FETCH`, `BYE`, ...).
    #[must_use]
    pub fn keyword(&self) -> &str {
        match self {
            Self::Condition { condition, .. } => condition.as_str(),
            Self::Data { keyword, .. } => keyword,
        }
    }

    /// Returns true if `keyword` matches, ignoring case.
    #[must_use]
    pub fn is(&self, keyword: &str) -> bool {
        self.keyword().eq_ignore_ascii_case(keyword)
    }

    /// Returns true for `* BYE`.
    #[must_use]
    pub const fn is_bye(&self) -> bool {
        matches!(
            self,
            Self::Condition {
                condition: Condition::Bye,
                ..
            }
        )
    }

    /// Returns the response code of a status condition.
    #[must_use]
    pub const fn code(&self) -> Option<&ResponseCode> {
        match self {
            Self::Condition { code, .. } => code.as_ref(),
            Self::Data { .. } => None,
        }
    }
}

/// Tagged command completion (`A1 OK LOGIN completed`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCompletion {
    /// Tag of the completed command.
    pub tag: Tag,
    /// Completion status.
    pub status: Status,
    /// Optional bracketed response code.
    pub code: Option<ResponseCode>,
    /// Human-readable text.
    pub text: String,
}
