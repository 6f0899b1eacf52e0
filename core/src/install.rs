//! Entry points: decide fast path or slow path, and run it.
//!
//! Fast path (private copies fresh): splice synchronously on the calling
//! thread, no worker. Slow path: open the dispatch gate, copy and splice on
//! the worker, return once the gate has closed.

use std::path::PathBuf;
use std::sync::Arc;

use codesplice_config::LoaderConfig;
use codesplice_types::{CodeUnit, CodeUnits, LoadOutcome};
use codesplice_utils::CopyOptions;
use tracing::{debug, info};

use crate::context::HostContext;
use crate::dispatch::Scheduler;
use crate::errors::{GateError, LoadError};
use crate::gate::{Completion, GateExit, run_gated};
use crate::loader::CodeLoader;
use crate::materializer::{ItemEvent, Materializer};
use crate::observer::InstallObserver;
use crate::splicer::{ClasspathSplicer, select_splicer, splice_units};
use crate::staleness::InstallSnapshot;

/// One startup attempt: which units to load, and who wants progress.
#[derive(Clone)]
pub struct LoadRequest {
    units: CodeUnits,
    observer: Option<Arc<dyn InstallObserver>>,
}

impl LoadRequest {
    #[must_use]
    pub fn new(units: CodeUnits) -> Self {
        Self {
            units,
            observer: None,
        }
    }

    pub fn parse<I, S>(names: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(CodeUnits::parse(names)?))
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn InstallObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn units(&self) -> &CodeUnits {
        &self.units
    }
}

/// Binds a host context, its controlling-thread scheduler, and the splice
/// strategy chosen for its loader.
pub struct Installer<'a, S: Scheduler + ?Sized> {
    ctx: &'a dyn HostContext,
    scheduler: &'a S,
    config: LoaderConfig,
    loader: Arc<dyn CodeLoader>,
    splicer: Arc<dyn ClasspathSplicer>,
}

impl<'a, S: Scheduler + ?Sized> Installer<'a, S> {
    /// Probes the context's loader once to pick the splice strategy.
    pub fn new(
        ctx: &'a dyn HostContext,
        scheduler: &'a S,
        config: LoaderConfig,
    ) -> Result<Self, LoadError> {
        let loader = ctx.code_loader();
        let splicer: Arc<dyn ClasspathSplicer> =
            Arc::from(select_splicer(loader.as_ref(), config.splice())?);
        info!(strategy = splicer.name(), "Selected splice strategy");
        Ok(Self {
            ctx,
            scheduler,
            config,
            loader,
            splicer,
        })
    }

    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Install (if stale) and splice every unit in `request`.
    ///
    /// Must be called on the controlling thread. Returns only after the
    /// search path has been extended, or after the loop was told to quit.
    /// An empty request is a no-op.
    pub fn install_and_load(&self, request: LoadRequest) -> Result<LoadOutcome, LoadError> {
        if !self.scheduler.is_current_thread() {
            return Err(GateError::WrongThread.into());
        }
        if request.units.is_empty() {
            info!("No archives requested");
            return Ok(LoadOutcome::AlreadyInstalled);
        }

        let dir = self
            .ctx
            .private_dir(self.config.dir_name())
            .map_err(LoadError::io("failed to create private directory"))?;
        let package = self
            .ctx
            .package_modified()
            .map_err(LoadError::io("failed to read package timestamp"))?;
        let snapshot = InstallSnapshot::gather(package, &dir, &request.units)
            .map_err(LoadError::io("failed to probe installed archives"))?;

        let staleness = snapshot.staleness();
        if !staleness.needs_install() {
            info!(
                dir = %dir.display(),
                count = request.units.len(),
                "Installed archives are fresh"
            );
            splice_units(
                self.splicer.as_ref(),
                self.loader.as_ref(),
                &dir,
                &request.units,
            )?;
            return Ok(LoadOutcome::AlreadyInstalled);
        }

        info!(reason = ?staleness, dir = %dir.display(), "Installing archives");
        self.install_gated(dir, request)
    }

    fn install_gated(&self, dir: PathBuf, request: LoadRequest) -> Result<LoadOutcome, LoadError> {
        let LoadRequest { units, observer } = request;
        let handle = self.scheduler.handle();

        let work = {
            let bundle = self.ctx.bundle();
            let loader = Arc::clone(&self.loader);
            let splicer = Arc::clone(&self.splicer);
            let observer = observer.clone();
            let handle = handle.clone();
            let options = CopyOptions {
                buffer_bytes: self.config.copy_buffer_bytes(),
                ..CopyOptions::default()
            };
            move || -> Completion {
                let report = Materializer::new(bundle.as_ref(), &dir, options).materialize(
                    &units,
                    |event| {
                        let Some(observer) = &observer else { return };
                        match event {
                            ItemEvent::Started(unit) => observer.on_item_started(unit, &handle),
                            ItemEvent::Ended(unit, outcome) => {
                                observer.on_item_ended(unit, outcome, &handle);
                            }
                        }
                    },
                );
                if let Some(observer) = &observer {
                    observer.on_batch_finished(&report, &handle);
                }
                splice_units(splicer.as_ref(), loader.as_ref(), &dir, &units)?;
                Ok(report)
            }
        };

        let exit = run_gated(
            self.scheduler,
            work,
            || match &observer {
                Some(observer) => observer.on_install_started(&handle),
                None => self.ctx.show_notice(self.config.notice()),
            },
            || {
                if let Some(observer) = &observer {
                    observer.on_install_ended(&handle);
                }
            },
        )?;

        match exit {
            GateExit::Completed(completion) => completion.map(LoadOutcome::Installed),
            GateExit::ShutDown => Ok(LoadOutcome::ShutDown),
        }
    }

    /// Load every bundled archive whose name ends in the configured
    /// extension, in name order.
    pub fn install_all_from_bundle(
        &self,
        observer: Option<Arc<dyn InstallObserver>>,
    ) -> Result<LoadOutcome, LoadError> {
        let names = self
            .ctx
            .bundle()
            .list()
            .map_err(LoadError::io("failed to list bundled archives"))?;
        let extension = self.config.archive_extension();
        let mut units: Vec<CodeUnit> = names
            .into_iter()
            .filter_map(|name| CodeUnit::new(name).ok())
            .filter(|unit| unit.has_extension(extension))
            .collect();
        units.sort();
        debug!(extension, count = units.len(), "Discovered bundled archives");

        let mut request = LoadRequest::new(CodeUnits::new(units)?);
        if let Some(observer) = observer {
            request = request.with_observer(observer);
        }
        self.install_and_load(request)
    }
}

/// [`Installer::install_and_load`] with default configuration.
pub fn install_and_load<S, I, N>(
    ctx: &dyn HostContext,
    scheduler: &S,
    names: I,
    observer: Option<Arc<dyn InstallObserver>>,
) -> Result<LoadOutcome, LoadError>
where
    S: Scheduler + ?Sized,
    I: IntoIterator<Item = N>,
    N: Into<String>,
{
    let mut request = LoadRequest::parse(names)?;
    if let Some(observer) = observer {
        request = request.with_observer(observer);
    }
    Installer::new(ctx, scheduler, LoaderConfig::default())?.install_and_load(request)
}

/// [`Installer::install_all_from_bundle`] with default configuration.
pub fn install_all_from_bundle<S>(
    ctx: &dyn HostContext,
    scheduler: &S,
    observer: Option<Arc<dyn InstallObserver>>,
) -> Result<LoadOutcome, LoadError>
where
    S: Scheduler + ?Sized,
{
    Installer::new(ctx, scheduler, LoaderConfig::default())?.install_all_from_bundle(observer)
}
