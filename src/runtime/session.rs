// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Session: the per-invocation execution context.
//!
//! A session binds an engine, a compiled module, the two sandbox channels,
//! program arguments, and one preopened host directory. `new_store` builds
//! the capability surface the guest sees; `run` instantiates the module and
//! drives its `_start` export; `cleanup` releases everything. Nothing outside
//! the configured surface is reachable from guest code.

use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wasmtime::{Config, Engine, Linker, Module, Store};
use wasmtime_wasi::p2::pipe::{MemoryInputPipe, MemoryOutputPipe};
use wasmtime_wasi::p2::WasiCtxBuilder;
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{DirPerms, FilePerms};

use crate::config::consts::{DEFAULT_FUEL_LIMIT, MAX_GUEST_OUTPUT_SIZE};
use crate::errors::{Error, Result};
use crate::observability::messages::runtime::GuestCompleted;
use crate::observability::messages::StructuredLog;
use crate::runtime::channel::ChannelPair;
use crate::runtime::host;

/// Create an engine configured for sandboxed command modules.
///
/// Fuel metering is on so runaway guests trap instead of spinning; the
/// component model stays off, this host runs core modules only. Serialized
/// modules are only compatible with engines built by this function.
pub fn create_engine() -> Result<Engine> {
    let mut config = Config::new();
    config.wasm_component_model(false);
    config.consume_fuel(true);
    Engine::new(&config).map_err(|e| Error::InstantiationFailed(format!("engine: {e}")))
}

/// Data attached to each store: the WASI context plus what host functions
/// need at call time.
pub struct GuestState {
    pub wasi: WasiP1Ctx,
    pub cancel: CancellationToken,
    pub http_timeout: Duration,
}

/// A single execution context. Created at request start, torn down before
/// the request returns on every path.
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    pub args: Vec<String>,
    pub engine: Engine,
    pub module: Module,
    pub channels: ChannelPair,
    pub preopened_dir: Option<PathBuf>,
    /// Instruction budget for one run.
    pub fuel_limit: u64,
    /// Timeout applied to outbound host-HTTP calls made by the guest.
    pub http_timeout: Duration,
}

/// The store, linker, and stdout capture for one run of a session's module.
pub struct SessionStore {
    pub store: Store<GuestState>,
    pub linker: Linker<GuestState>,
    stdout_pipe: MemoryOutputPipe,
}

impl Session {
    /// Construct a session, creating its I/O channels.
    pub fn new(
        id: Uuid,
        engine: Engine,
        module: Module,
        args: Vec<String>,
        preopened_dir: Option<PathBuf>,
    ) -> Result<Self> {
        let channels = ChannelPair::for_session(id)?;
        Ok(Self {
            id,
            args,
            engine,
            module,
            channels,
            preopened_dir,
            fuel_limit: DEFAULT_FUEL_LIMIT,
            http_timeout: Duration::from_secs(30),
        })
    }

    /// Configure the WASI environment and link host functions.
    ///
    /// The capability surface: the session's stdin/stdout channels, inherited
    /// stderr and environment, the session args, and exactly one preopened
    /// directory mapped to the guest path `/` (directory read, files
    /// read+write). The stdin channel's current contents are presented to the
    /// guest; guest output is captured and drained back into the stdout
    /// channel by [`Session::flush_stdout`].
    pub fn new_store(&mut self, cancel: &CancellationToken) -> Result<SessionStore> {
        let input = self.channels.stdin.read_all()?;
        let stdout_pipe = MemoryOutputPipe::new(MAX_GUEST_OUTPUT_SIZE);

        let mut builder = WasiCtxBuilder::new();
        builder
            .stdin(MemoryInputPipe::new(input))
            .stdout(stdout_pipe.clone())
            .inherit_stderr()
            .inherit_env()
            .args(&self.args);

        let dir = self.preopen_dir()?;
        builder
            .preopened_dir(
                &dir,
                "/",
                DirPerms::READ,
                FilePerms::READ | FilePerms::WRITE,
            )
            .map_err(|e| {
                Error::InstantiationFailed(format!(
                    "preopen {} failed: {e}",
                    dir.display()
                ))
            })?;

        let wasi = builder.build_p1();
        let mut store = Store::new(
            &self.engine,
            GuestState {
                wasi,
                cancel: cancel.clone(),
                http_timeout: self.http_timeout,
            },
        );
        store
            .set_fuel(self.fuel_limit)
            .map_err(|e| Error::InstantiationFailed(format!("fuel setup failed: {e}")))?;

        let mut linker: Linker<GuestState> = Linker::new(&self.engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state: &mut GuestState| {
            &mut state.wasi
        })
        .map_err(|e| Error::InstantiationFailed(format!("wasi link: {e}")))?;

        host::link(&mut linker)?;

        Ok(SessionStore {
            store,
            linker,
            stdout_pipe,
        })
    }

    /// Instantiate the module and call its `_start` export.
    ///
    /// A guest-initiated exit with status 0 is success even though the engine
    /// surfaces it through its error channel; any other exit status or trap
    /// is a guest execution error with the diagnostic carried through.
    pub fn run(&self, session_store: &mut SessionStore) -> Result<()> {
        let SessionStore { store, linker, .. } = session_store;

        let instance = linker
            .instantiate(&mut *store, &self.module)
            .map_err(|e| Error::InstantiationFailed(e.to_string()))?;

        let start = instance
            .get_typed_func::<(), ()>(&mut *store, "_start")
            .map_err(|_| Error::MissingEntryPoint)?;

        match start.call(&mut *store, ()) {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Some(exit) = e.downcast_ref::<wasmtime_wasi::I32Exit>() {
                    if exit.0 == 0 {
                        return Ok(());
                    }
                    return Err(Error::GuestExecutionError(format!(
                        "guest exited with status {}",
                        exit.0
                    )));
                }
                Err(Error::GuestExecutionError(e.to_string()))
            }
        }
    }

    /// Drain the guest's captured stdout into the session's stdout channel.
    pub fn flush_stdout(&mut self, session_store: SessionStore) -> Result<()> {
        let contents = session_store.stdout_pipe.contents();
        self.channels.stdout.reset()?;
        self.channels.stdout.write(&contents)?;
        self.channels.stdout.sync()?;
        Ok(())
    }

    /// Pass one request envelope through the guest: reset stdin and load it
    /// with the envelope, build the store, run `_start`, then return
    /// everything the guest wrote to stdout.
    pub fn execute_envelope(
        &mut self,
        envelope: &[u8],
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>> {
        let started = Instant::now();

        self.channels.stdin.reset()?;
        self.channels.stdin.write(envelope)?;
        self.channels.stdin.sync()?;

        let mut session_store = self.new_store(cancel)?;
        self.run(&mut session_store)?;
        self.flush_stdout(session_store)?;

        let output = self.channels.stdout.read_all()?;
        GuestCompleted {
            session_id: &self.id.to_string(),
            stdout_bytes: output.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
        .log();
        Ok(output)
    }

    fn preopen_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.preopened_dir {
            return Ok(dir.clone());
        }
        std::env::current_dir()
            .map_err(|e| Error::InstantiationFailed(format!("no working directory: {e}")))
    }

    /// Release channels and engine resources. Runs on every exit path.
    pub fn cleanup(self) -> Result<()> {
        // Engine and module drop with the session; the channels need their
        // backing storage unlinked.
        self.channels.remove()
    }
}
