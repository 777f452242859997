// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Chart repository access: index lookup, URL resolution, archive download and loading.

pub mod fetcher;
pub mod index;
pub mod loader;
pub mod resolver;
pub mod transport;
pub mod url;

pub use fetcher::{ChartFetcher, ChartVerifier, DigestVerifier};
pub use index::{ChartVersion, RepositoryIndex};
pub use loader::{ArchiveLoader, Chart, ChartMetadata, TarballLoader};
pub use resolver::{ChartResolver, ResolvedChart};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};
