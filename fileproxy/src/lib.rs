//! `fileproxy` is an authenticating caching proxy for individual files ("artifacts").
//!
//! You are reading the library API documentation. If you want to run the proxy, have a look
//! at the `fileproxy-server` binary.
//!
//! Clients request artifacts by a hierarchical [key::Key]. The proxy answers from its local
//! content store and, on a miss, fetches the artifact from a remote origin, stores it, and
//! returns it. `fileproxy` makes use of these main concepts:
//!
//! - **Storage**: A [storage] is a place where files are stored, for example the local
//!   filesystem. The [store::ContentStore] maps keys onto a storage.
//! - **Origin**: The [origin] is the authoritative source of artifacts. Requests to it carry
//!   the proxy's own credentials.
//! - **Coordinator**: The [coordinator::CacheCoordinator] resolves keys, making sure that
//!   concurrent misses for the same key result in a single fetch.
//! - **Auth**: Clients are authenticated and authorized with the traits in [auth],
//!   independently of the origin credentials.
//!
//! The [handler::ProxyHandler] combines all of these into a request handler.

pub mod auth;
pub mod content;
pub mod coordinator;
pub mod handler;
pub mod key;
pub mod origin;
pub mod storage;
pub mod store;

pub mod util {
    //! Collects traits, functions, etc. that are not directly related to the main concepts of
    //! `fileproxy`.

    pub mod asyncio;
    pub mod close;
}
pub mod test_util {
    //! Utilities for testing `fileproxy` code.
    //!
    //! These are not intended to be used in production code.

    pub mod origin;
}
