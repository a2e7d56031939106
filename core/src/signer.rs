use crate::{Context, ProvideCredential, Result, SignRequest, SigningCredential};
use log::debug;
use std::sync::{Arc, Mutex};

/// Signer is the main struct used to sign the request.
///
/// It holds only static configuration: the context, how to load a
/// credential, how to sign with it, and the credential once loaded.
/// Anything that varies per request travels with the request itself.
#[derive(Clone, Debug)]
pub struct Signer<K: SigningCredential> {
    ctx: Context,
    loader: Arc<dyn ProvideCredential<Credential = K>>,
    builder: Arc<dyn SignRequest<Credential = K>>,
    credential: Arc<Mutex<Cached<K>>>,
}

/// Credential held by a signer.
///
/// An explicitly set credential is authoritative: it is handed to the
/// request signer as is, even when invalid, and the loader is never asked.
#[derive(Debug)]
struct Cached<K> {
    value: Option<K>,
    explicit: bool,
}

impl<K: SigningCredential> Signer<K> {
    /// Create a new signer.
    pub fn new(
        ctx: Context,
        loader: impl ProvideCredential<Credential = K>,
        builder: impl SignRequest<Credential = K>,
    ) -> Self {
        Self {
            ctx,

            loader: Arc::new(loader),
            builder: Arc::new(builder),
            credential: Arc::new(Mutex::new(Cached {
                value: None,
                explicit: false,
            })),
        }
    }

    /// Replace the credential used for signing.
    ///
    /// Every clone of this signer observes the new value. The loader is not
    /// consulted afterwards, so an incomplete credential makes signing fail
    /// instead of falling back to whatever the loader provides.
    pub fn set_credential(&self, credential: K) {
        *self.credential.lock().expect("lock poisoned") = Cached {
            value: Some(credential),
            explicit: true,
        };
    }

    /// The context this signer loads credentials with.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Load the credential, reusing the cached one while it stays valid.
    pub async fn credential(&self) -> Result<Option<K>> {
        {
            let cached = self.credential.lock().expect("lock poisoned");
            if cached.explicit || cached.value.is_valid() {
                return Ok(cached.value.clone());
            }
        }

        debug!("no valid credential cached, loading from provider");
        let cred = self.loader.provide_credential(&self.ctx).await?;
        if cred.is_valid() {
            let mut cached = self.credential.lock().expect("lock poisoned");
            // A credential set while loading wins.
            if !cached.explicit {
                cached.value = cred.clone();
            }
        }
        Ok(cred)
    }

    /// Signing request.
    pub async fn sign(&self, req: &mut http::request::Parts, body: &[u8]) -> Result<()> {
        let cred = self.credential().await?;

        self.builder
            .sign_request(&self.ctx, req, body, cred.as_ref())
            .await
    }
}
