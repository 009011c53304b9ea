//! Grant sequencing.
//!
//! The remote side keeps at most one grant warm per session and grants expire
//! quickly, so a grant must be requested right before its transfer and used
//! before the next one is requested. [`GrantSession::issue`] borrows the
//! session mutably for as long as the returned [`IssuedGrant`] lives, which
//! makes "two grants outstanding at once" a compile error rather than a
//! convention.

use std::marker::PhantomData;
use std::ops::Deref;

use super::traits::GrantBroker;
use crate::error::EngineError;
use crate::remote::{CommitDocument, Session, UploadGrant};

pub struct GrantSession<'a> {
    broker: &'a dyn GrantBroker,
    session: &'a Session,
    document: &'a CommitDocument,
    issued: usize,
}

impl<'a> GrantSession<'a> {
    pub fn new(broker: &'a dyn GrantBroker, session: &'a Session, document: &'a CommitDocument) -> Self {
        Self {
            broker,
            session,
            document,
            issued: 0,
        }
    }

    /// Request the grant for `name`. Must be handed to a transfer before the next call.
    pub async fn issue(&mut self, name: &str) -> Result<IssuedGrant<'_>, EngineError> {
        tracing::debug!(target: "depot.grant", stage = "grant.request.in", name = %name);
        let grant = self
            .broker
            .request_grant(self.session, self.document, name)
            .await?;
        self.issued += 1;
        tracing::debug!(
            target: "depot.grant",
            stage = "grant.request.out",
            name = %name,
            target_name = %grant.target_name(),
            method = ?grant.method()
        );
        Ok(IssuedGrant {
            grant,
            _session: PhantomData,
        })
    }

    /// Grants handed out so far in this run.
    pub fn issued(&self) -> usize {
        self.issued
    }
}

/// A grant that is live for the current file only.
pub struct IssuedGrant<'s> {
    grant: UploadGrant,
    _session: PhantomData<&'s mut ()>,
}

impl Deref for IssuedGrant<'_> {
    type Target = UploadGrant;

    fn deref(&self) -> &UploadGrant {
        &self.grant
    }
}
