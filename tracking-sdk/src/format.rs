//! Response shape selection: the raw wire document, the mapped form, or both.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    #[default]
    Raw,
    Mapped,
    Both,
}

impl FromStr for ResponseFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "mapped" => Ok(Self::Mapped),
            "both" => Ok(Self::Both),
            _ => Err(ParseError::UnknownFormat(s.into())),
        }
    }
}

impl fmt::Display for ResponseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Raw => "raw",
            Self::Mapped => "mapped",
            Self::Both => "both",
        })
    }
}

/// Per-call options. `format: None` defers to the client's configured default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallOptions {
    pub format: Option<ResponseFormat>,
}

impl CallOptions {
    pub fn with_format(format: ResponseFormat) -> Self {
        Self {
            format: Some(format),
        }
    }

    pub fn effective_format(&self, default: ResponseFormat) -> ResponseFormat {
        self.format.unwrap_or(default)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListOptions {
    pub format: Option<ResponseFormat>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl ListOptions {
    pub fn with_format(format: ResponseFormat) -> Self {
        Self {
            format: Some(format),
            ..Self::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn call_options(&self) -> CallOptions {
        CallOptions {
            format: self.format,
        }
    }

    /// `page[number]` / `page[size]` query parameters for the options that are set.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(page) = self.page {
            pairs.push(("page[number]".to_string(), page.to_string()));
        }
        if let Some(size) = self.page_size {
            pairs.push(("page[size]".to_string(), size.to_string()));
        }
        pairs
    }
}

/// Outcome of [`resolve`]. `Both` serializes as `{"raw": ..., "mapped": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Formatted<R, M> {
    Raw(R),
    Mapped(M),
    Both { raw: R, mapped: M },
}

impl<R, M> Formatted<R, M> {
    pub fn raw(&self) -> Option<&R> {
        match self {
            Self::Raw(raw) | Self::Both { raw, .. } => Some(raw),
            Self::Mapped(_) => None,
        }
    }

    pub fn mapped(&self) -> Option<&M> {
        match self {
            Self::Mapped(mapped) | Self::Both { mapped, .. } => Some(mapped),
            Self::Raw(_) => None,
        }
    }

    pub fn into_mapped(self) -> Option<M> {
        match self {
            Self::Mapped(mapped) | Self::Both { mapped, .. } => Some(mapped),
            Self::Raw(_) => None,
        }
    }

    pub fn format(&self) -> ResponseFormat {
        match self {
            Self::Raw(_) => ResponseFormat::Raw,
            Self::Mapped(_) => ResponseFormat::Mapped,
            Self::Both { .. } => ResponseFormat::Both,
        }
    }
}

impl<R: Serialize, M: Serialize> Formatted<R, M> {
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Shapes `raw` according to `format`.
///
/// `map` is consumed by value: it is never called for [`ResponseFormat::Raw`] and called
/// exactly once otherwise.
pub fn resolve<R, M, E, F>(raw: R, format: ResponseFormat, map: F) -> Result<Formatted<R, M>, E>
where
    F: FnOnce(&R) -> Result<M, E>,
{
    Ok(match format {
        ResponseFormat::Raw => Formatted::Raw(raw),
        ResponseFormat::Mapped => Formatted::Mapped(map(&raw)?),
        ResponseFormat::Both => {
            let mapped = map(&raw)?;
            Formatted::Both { raw, mapped }
        }
    })
}
