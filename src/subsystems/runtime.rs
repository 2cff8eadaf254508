//! Task scaffolding shared by long-running parts of the bot.
//!
//! A [`Component`] owns everything it needs and runs until the shared
//! [`CancellationToken`] fires or its work ends. [`spawn_components`] runs a
//! set of them concurrently; the first failure cancels the token so the
//! others wind down, and is then reported through the [`SubsystemHandle`].

use std::future::Future;
use std::pin::Pin;

use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::error::AppError;

pub type ComponentFuture = Pin<Box<dyn Future<Output = Result<(), AppError>> + Send + 'static>>;

pub trait Component: Send + 'static {
    /// Name used in logs.
    fn id(&self) -> &str;

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture;
}

/// Resolves once every spawned component has exited.
pub struct SubsystemHandle {
    inner: JoinHandle<Result<(), AppError>>,
}

impl SubsystemHandle {
    pub async fn join(self) -> Result<(), AppError> {
        match self.inner.await {
            Ok(r) => r,
            Err(e) => Err(AppError::Comms(format!("subsystem task panicked: {e}"))),
        }
    }
}

pub fn spawn_components(components: Vec<Box<dyn Component>>, shutdown: CancellationToken) -> SubsystemHandle {
    let handle = tokio::spawn(async move {
        let mut set: JoinSet<Result<(), AppError>> = JoinSet::new();

        for component in components {
            debug!(component = component.id(), "spawning component");
            set.spawn(component.run(shutdown.clone()));
        }

        let mut first_err: Option<AppError> = None;
        while let Some(res) = set.join_next().await {
            let err = match res {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e,
                Err(e) => AppError::Comms(format!("component panicked: {e}")),
            };
            error!("component failed: {err}");
            shutdown.cancel();
            first_err.get_or_insert(err);
        }

        first_err.map_or(Ok(()), Err)
    });

    SubsystemHandle { inner: handle }
}
