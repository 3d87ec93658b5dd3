// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod cat;
pub mod list;
pub mod mkdir;
pub mod put;
pub mod remove;

pub use cat::cat_command;
pub use list::{exists_command, list_command};
pub use mkdir::mkdir_command;
pub use put::put_command;
pub use remove::{rm_command, rmdir_command};
