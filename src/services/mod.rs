// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Service layer: deployment management and the execution pipeline.

pub mod deploy;
pub mod run;


pub use deploy::{DeployOutcome, DeployRequest, DeployService};
pub use run::RunService;
