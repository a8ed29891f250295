// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! External collaborators of the core: the deployment metadata store and the
//! artifact object store. Only their interfaces matter to the pipeline; the
//! implementations here are local reference backends (in-memory for tests
//! and single-process use, filesystem for the object store).

pub mod metadata;
pub mod object;

pub use metadata::{Deployment, DeploymentStore, MemoryDeploymentStore};
pub use object::{FsObjectStore, MemoryObjectStore, ObjectStore};
