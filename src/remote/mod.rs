//! Remote store capabilities: scoped catalog listing and single-object download.
//!
//! The pipeline only ever talks to the remote store through the
//! [`CatalogSource`] and [`ObjectFetcher`] traits. [`AutoDriveClient`] is the
//! HTTP implementation of both; tests substitute in-memory fakes.

mod client;
mod error;

pub use client::{
    AutoDriveClient, ClientBuildError, ClientConfig, DEFAULT_API_URL, DEFAULT_DOWNLOAD_URL,
};
pub use error::{CatalogError, FetchError, reason_phrase};

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Independently queried partition of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Objects visible to everyone.
    Public,
    /// Objects owned by the API key's account.
    Private,
}

impl Scope {
    /// Every scope in crawl order.
    pub const ALL: [Self; 2] = [Self::Public, Self::Private];

    /// Label stored with records and used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Value of the `scope` query parameter understood by the catalog API.
    #[must_use]
    pub fn api_value(&self) -> &'static str {
        match self {
            Self::Public => "global",
            Self::Private => "user",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            _ => Err(format!("invalid scope: {s}")),
        }
    }
}

/// One object as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogObject {
    /// Content identifier.
    pub cid: String,
    /// Display name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type, when known.
    pub mime_type: Option<String>,
    /// Object type (`file`, `folder`, ...).
    pub object_type: String,
}

/// One page of a scoped catalog listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogPage {
    /// Objects on this page.
    pub items: Vec<CatalogObject>,
    /// Total number of objects in the scope at the time of the request.
    pub total_count: u64,
}

/// Downloaded object body.
pub type ByteStream = BoxStream<'static, Result<Bytes, FetchError>>;

/// Paginated, scoped catalog listing.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Lists up to `limit` objects of `scope` starting at `offset`.
    async fn list_objects(
        &self,
        scope: Scope,
        offset: u64,
        limit: u64,
    ) -> Result<CatalogPage, CatalogError>;
}

/// Single-object download.
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Starts downloading `cid`, returning its body as a byte stream.
    async fn fetch(&self, cid: &str) -> Result<ByteStream, FetchError>;
}
