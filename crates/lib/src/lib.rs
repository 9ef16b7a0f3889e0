//! concierge-lib: deploy a Nix flake configuration onto the current machine.
//!
//! The library is split along the deployment pipeline:
//! - `settings`: where the working flake lives and where it gets installed
//! - `plan`: the ordered list of steps a deployment will take
//! - `execute`: running a plan, one step at a time
//! - `sync`: keeping the working flake in step with its git remote
//! - `compose`, `nix`, `rsync`, `tag`: the individual step kinds

pub mod compose;
pub mod consts;
pub mod execute;
pub mod git;
pub mod nix;
pub mod plan;
pub mod platform;
pub mod process;
pub mod rsync;
pub mod settings;
pub mod sync;
pub mod tag;
pub mod util;
