//! Discovery of live BPF maps through `bpftool map list`.
//!
//! Map ids change whenever the XDP program is reloaded, so nothing here is
//! cached: every call lists the maps again.

use std::fmt;
use tracing::debug;

use crate::bpftool::{parse_map_list, MapInfo};
use crate::cmd_abstraction::{args_to_strings, CommandExecutor};
use crate::codec::KEY_LEN;
use crate::error::BlocklistError;

/// Identifier of a discovered map, as accepted by `bpftool map ... id <ID>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle(String);

impl TableHandle {
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves map names to handles using the control tool.
pub struct TableLocator<'a, E: CommandExecutor> {
    executor: &'a E,
    tool_path: &'a str,
}

impl<'a, E: CommandExecutor> TableLocator<'a, E> {
    pub fn new(executor: &'a E, tool_path: &'a str) -> Self {
        Self {
            executor,
            tool_path,
        }
    }

    /// Locate the blocklist map.
    ///
    /// Matches on the declared name first. Some listings omit names, so the
    /// first hash map with 4-byte keys is used as a fallback.
    pub fn locate(&self, table_name: &str) -> Result<TableHandle, BlocklistError> {
        let maps = self.list_maps(table_name)?;

        if let Some(map) = find_by_name(&maps, table_name) {
            debug!("Found map '{}' with id {}", table_name, map.id);
            return Ok(TableHandle(map.id.clone()));
        }

        if let Some(map) = find_by_shape(&maps) {
            debug!(
                "No map named '{}', using {} map with id {} ({}-byte keys)",
                table_name, map.kind, map.id, KEY_LEN
            );
            return Ok(TableHandle(map.id.clone()));
        }

        Err(BlocklistError::TableNotFound(table_name.to_string()))
    }

    /// Locate a map by its declared name only.
    pub fn locate_by_name(&self, table_name: &str) -> Result<TableHandle, BlocklistError> {
        let maps = self.list_maps(table_name)?;
        find_by_name(&maps, table_name)
            .map(|map| TableHandle(map.id.clone()))
            .ok_or_else(|| BlocklistError::TableNotFound(table_name.to_string()))
    }

    fn list_maps(&self, table_name: &str) -> Result<Vec<MapInfo>, BlocklistError> {
        let args = args_to_strings(&["map", "list"]);
        let output = self.executor.execute(self.tool_path, &args).map_err(|e| {
            debug!("Failed to execute {}: {}", self.tool_path, e);
            BlocklistError::TableNotFound(table_name.to_string())
        })?;

        if !output.success {
            debug!("{} map list failed: {}", self.tool_path, output.stderr.trim());
            return Err(BlocklistError::TableNotFound(table_name.to_string()));
        }

        Ok(parse_map_list(&output.stdout))
    }
}

fn find_by_name<'m>(maps: &'m [MapInfo], table_name: &str) -> Option<&'m MapInfo> {
    maps.iter().find(|m| m.name.as_deref() == Some(table_name))
}

fn find_by_shape(maps: &[MapInfo]) -> Option<&MapInfo> {
    maps.iter()
        .find(|m| m.is_hash() && m.key_size == Some(KEY_LEN as u32))
}
