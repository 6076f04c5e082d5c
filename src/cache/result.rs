//! Result wrapper telling callers where query data came from.

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
}

impl<T> CacheResult<T> {
  /// Data obtained by a gateway call this caller started.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
    }
  }

  /// Data served from the record cache.
  pub fn from_cache(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
    }
  }

  /// Data obtained by joining a gateway call already in flight.
  pub fn joined(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Joined,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      source: self.source,
    }
  }
}

/// Indicates where query data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from the network
  Network,
  /// Cache hit, no request made
  Cache,
  /// Shared the result of an identical request already in flight
  Joined,
}
