//! Validates claimed mate-in-N chess puzzles against an external analysis engine.
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
#![warn(missing_docs, missing_debug_implementations, unused_extern_crates)]
#![warn(clippy::unimplemented, clippy::option_unwrap_used, clippy::result_unwrap_used)]

pub mod chess;
pub mod uci;
pub mod verify;
