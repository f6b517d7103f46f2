//! Reachability and authorization checker for a lattice target.

use std::future::Future;

use tracing::debug;

use crate::receptor::{ApiErrorKind, HttpReceptorClient, ReceptorClient, ReceptorError};

/// Outcome of probing a receptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    /// The receptor answered.
    pub reachable: bool,
    /// The receptor accepted the credentials.
    pub authorized: bool,
    /// Failure other than a plain authorization rejection.
    pub error: Option<ReceptorError>,
}

impl Verification {
    /// Reachable and authorized.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            reachable: true,
            authorized: true,
            error: None,
        }
    }
}

/// Verifies a receptor endpoint.
pub trait TargetVerifier: Send + Sync {
    /// Checks the receptor at `receptor_url`.
    fn verify_target(&self, receptor_url: &str) -> impl Future<Output = Verification> + Send;
}

impl<T: TargetVerifier + ?Sized> TargetVerifier for &T {
    fn verify_target(&self, receptor_url: &str) -> impl Future<Output = Verification> + Send {
        (**self).verify_target(receptor_url)
    }
}

/// Classifies the result of one idempotent receptor read.
#[must_use]
pub fn classify<T>(result: Result<T, ReceptorError>) -> Verification {
    match result {
        Ok(_) => Verification::ok(),
        Err(err) if err.is(ApiErrorKind::Unauthorized) => Verification {
            reachable: true,
            authorized: false,
            error: None,
        },
        Err(err @ ReceptorError::Api { .. }) => Verification {
            reachable: true,
            authorized: false,
            error: Some(err),
        },
        Err(err @ ReceptorError::Transport(_)) => Verification {
            reachable: false,
            authorized: false,
            error: Some(err),
        },
    }
}

/// Verifies a target by listing its desired LRPs.
pub async fn verify_with<R: ReceptorClient>(client: &R) -> Verification {
    let verification = classify(client.desired_lrps().await);
    debug!(
        reachable = verification.reachable,
        authorized = verification.authorized,
        "target verified"
    );
    verification
}

/// [`TargetVerifier`] over HTTP.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpTargetVerifier;

impl TargetVerifier for HttpTargetVerifier {
    async fn verify_target(&self, receptor_url: &str) -> Verification {
        match HttpReceptorClient::new(receptor_url) {
            Ok(client) => verify_with(&client).await,
            Err(err) => Verification {
                reachable: false,
                authorized: false,
                error: Some(err),
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use parking_lot::Mutex;

    use super::{TargetVerifier, Verification};

    /// Returns scripted verifications in order, repeating the last one.
    #[derive(Debug)]
    pub struct FakeTargetVerifier {
        results: Mutex<Vec<Verification>>,
        urls: Mutex<Vec<String>>,
    }

    impl FakeTargetVerifier {
        pub fn new(results: Vec<Verification>) -> Self {
            Self {
                results: Mutex::new(results),
                urls: Mutex::new(Vec::new()),
            }
        }

        pub fn urls(&self) -> Vec<String> {
            self.urls.lock().clone()
        }
    }

    impl TargetVerifier for FakeTargetVerifier {
        async fn verify_target(&self, receptor_url: &str) -> Verification {
            self.urls.lock().push(receptor_url.to_string());
            let mut results = self.results.lock();
            if results.len() > 1 {
                results.remove(0)
            } else {
                results.first().cloned().unwrap_or_else(Verification::ok)
            }
        }
    }
}
