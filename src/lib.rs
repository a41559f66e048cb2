//! erd-engine - Entity-relationship diagram engine
//!
//! Derives a node-link diagram from a relational schema, lays it out with an
//! interruptible force simulation, and keeps it consistent with schema edits
//! coming from direct manipulation, DDL import or an AI assistant.

pub mod core;
