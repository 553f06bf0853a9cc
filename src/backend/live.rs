//! Live backend: the XDP program's `blocked_ips` hash map, through bpftool.

use tracing::{debug, info, warn};

use super::{BlocklistBackend, BlocklistStats, Change, Listing, TrafficStats};
use crate::bpftool::parse_counters;
use crate::cmd_abstraction::{CommandExecutor, CommandOutput, RealCommandExecutor};
use crate::codec::BlockedAddress;
use crate::config::{BackendKind, Config};
use crate::error::BlocklistError;
use crate::locator::{TableHandle, TableLocator};

/// Value stored for every blocked key; only presence matters.
const PRESENCE_VALUE: &str = "01";

/// Live backend. No locking: other bpftool users and the data plane itself
/// can mutate the map between any two invocations.
pub struct LiveBackend<E: CommandExecutor = RealCommandExecutor> {
    executor: E,
    tool_path: String,
    table_name: String,
    counter_table: String,
}

impl LiveBackend<RealCommandExecutor> {
    pub fn new(config: &Config) -> Self {
        Self::with_executor(RealCommandExecutor::new(), config)
    }
}

impl<E: CommandExecutor> LiveBackend<E> {
    pub fn with_executor(executor: E, config: &Config) -> Self {
        Self {
            executor,
            tool_path: config.tool_path.clone(),
            table_name: config.table_name.clone(),
            counter_table: config.counter_table.clone(),
        }
    }

    fn locator(&self) -> TableLocator<'_, E> {
        TableLocator::new(&self.executor, &self.tool_path)
    }

    fn run(&self, args: Vec<String>) -> anyhow::Result<CommandOutput> {
        debug!("Running {} {}", self.tool_path, args.join(" "));
        self.executor.execute(&self.tool_path, &args)
    }

    fn dump(&self, handle: &TableHandle, table_name: &str) -> Result<String, BlocklistError> {
        let args = vec![
            "map".to_string(),
            "dump".to_string(),
            "id".to_string(),
            handle.id().to_string(),
        ];
        match self.run(args) {
            Ok(output) if output.success => Ok(output.stdout),
            Ok(output) => {
                // Most likely the map went away between list and dump
                debug!("dump of map id {} failed: {}", handle, output.stderr.trim());
                Err(BlocklistError::TableNotFound(table_name.to_string()))
            }
            Err(e) => {
                debug!("Failed to execute {}: {}", self.tool_path, e);
                Err(BlocklistError::TableNotFound(table_name.to_string()))
            }
        }
    }

    /// Delete one key. A failing delete means the key was absent (or the
    /// map vanished), which is not an error for removal.
    fn delete(&self, handle: &TableHandle, address: &BlockedAddress) -> Change {
        let mut args = vec![
            "map".to_string(),
            "delete".to_string(),
            "id".to_string(),
            handle.id().to_string(),
            "key".to_string(),
            "hex".to_string(),
        ];
        args.extend(address.key().hex_bytes());

        match self.run(args) {
            Ok(output) if output.success => Change::Applied,
            Ok(output) => {
                let stderr = output.stderr.trim();
                if stderr.is_empty() || stderr.contains("No such file or directory") {
                    debug!("{} was not in map id {}", address, handle);
                } else {
                    warn!("Could not delete {} from map id {}: {}", address, handle, stderr);
                }
                Change::Unchanged
            }
            Err(e) => {
                warn!("Failed to execute {}: {}", self.tool_path, e);
                Change::Unchanged
            }
        }
    }

    fn traffic(&self) -> Option<TrafficStats> {
        let handle = match self.locator().locate_by_name(&self.counter_table) {
            Ok(handle) => handle,
            Err(e) => {
                debug!("No packet counters: {}", e);
                return None;
            }
        };
        let output = self.dump(&handle, &self.counter_table).ok()?;
        let counters = parse_counters(&output);
        Some(TrafficStats::new(counters.allowed, counters.blocked, false))
    }
}

impl<E: CommandExecutor> BlocklistBackend for LiveBackend<E> {
    fn kind(&self) -> BackendKind {
        BackendKind::Live
    }

    fn add(&self, address: &BlockedAddress) -> Result<Change, BlocklistError> {
        let handle = self.locator().locate(&self.table_name)?;

        let mut args = vec![
            "map".to_string(),
            "update".to_string(),
            "id".to_string(),
            handle.id().to_string(),
            "key".to_string(),
            "hex".to_string(),
        ];
        args.extend(address.key().hex_bytes());
        args.extend(["value".to_string(), "hex".to_string(), PRESENCE_VALUE.to_string()]);

        let output = self.run(args).map_err(|e| BlocklistError::BackendWriteFailed {
            operation: "block",
            address: address.to_string(),
            stderr: e.to_string(),
        })?;

        if !output.success {
            return Err(BlocklistError::BackendWriteFailed {
                operation: "block",
                address: address.to_string(),
                stderr: output.stderr.trim().to_string(),
            });
        }

        info!("Blocked {} in map id {}", address, handle);
        // An upsert cannot tell whether the key already existed
        Ok(Change::Applied)
    }

    fn remove(&self, address: &BlockedAddress) -> Result<Change, BlocklistError> {
        let handle = self.locator().locate(&self.table_name)?;
        let change = self.delete(&handle, address);
        if change == Change::Applied {
            info!("Unblocked {} in map id {}", address, handle);
        }
        Ok(change)
    }

    fn list(&self) -> Result<Listing, BlocklistError> {
        let handle = self.locator().locate(&self.table_name)?;
        let output = self.dump(&handle, &self.table_name)?;
        Ok(Listing::from_dump(&output))
    }

    /// Deletes whatever the dump showed when the call started. Entries added
    /// by other actors after the dump survive.
    fn clear(&self) -> Result<usize, BlocklistError> {
        let handle = self.locator().locate(&self.table_name)?;
        let output = self.dump(&handle, &self.table_name)?;

        let mut deleted = 0;
        for text in Listing::from_dump(&output) {
            let address = BlockedAddress::parse(&text)?;
            if self.delete(&handle, &address) == Change::Applied {
                deleted += 1;
            }
        }

        info!("Cleared {} entries from map id {}", deleted, handle);
        Ok(deleted)
    }

    fn stats(&self) -> Result<BlocklistStats, BlocklistError> {
        let blocked_rules = self.list()?.count();
        Ok(BlocklistStats {
            backend: BackendKind::Live,
            blocked_rules,
            traffic: self.traffic(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_abstraction::MockCommandExecutor;
    use mockall::Sequence;

    const MAP_LIST: &str = "\
3: array  name pkt_count  flags 0x0
\tkey 4B  value 8B  max_entries 2  memlock 4096B
12: hash  name blocked_ips  flags 0x0
\tkey 4B  value 1B  max_entries 1024  memlock 86016B
";

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
            code: Some(0),
        }
    }

    fn failed(stderr: &str) -> CommandOutput {
        CommandOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: false,
            code: Some(255),
        }
    }

    fn args_eq(args: &[String], expected: &[&str]) -> bool {
        args.len() == expected.len() && args.iter().zip(expected.iter()).all(|(a, e)| a == *e)
    }

    fn is_map_list(args: &[String]) -> bool {
        args_eq(args, &["map", "list"])
    }

    fn expect_map_list(mock: &mut MockCommandExecutor, listing: &'static str) {
        mock.expect_execute()
            .withf(|_, args| is_map_list(args))
            .returning(move |_, _| Ok(ok(listing)));
    }

    fn addr(text: &str) -> BlockedAddress {
        BlockedAddress::parse(text).unwrap()
    }

    fn backend(mock: MockCommandExecutor) -> LiveBackend<MockCommandExecutor> {
        LiveBackend::with_executor(mock, &Config::default())
    }

    #[test]
    fn test_add_invokes_update() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|cmd, args| {
                cmd == "bpftool"
                    && args_eq(
                        args,
                        &[
                            "map", "update", "id", "12", "key", "hex", "c0", "a8", "01", "64",
                            "value", "hex", "01",
                        ],
                    )
            })
            .times(1)
            .returning(|_, _| Ok(ok("")));

        let change = backend(mock).add(&addr("192.168.1.100")).unwrap();
        assert_eq!(change, Change::Applied);
    }

    #[test]
    fn test_add_twice_succeeds() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("update"))
            .times(2)
            .returning(|_, _| Ok(ok("")));

        let live = backend(mock);
        assert!(live.add(&addr("10.0.0.5")).is_ok());
        assert!(live.add(&addr("10.0.0.5")).is_ok());
    }

    #[test]
    fn test_add_write_failure_keeps_stderr() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("update"))
            .returning(|_, _| Ok(failed("Error: update failed: Argument list too long\n")));

        let err = backend(mock).add(&addr("10.0.0.5")).unwrap_err();
        match err {
            BlocklistError::BackendWriteFailed {
                operation,
                address,
                stderr,
            } => {
                assert_eq!(operation, "block");
                assert_eq!(address, "10.0.0.5");
                assert_eq!(stderr, "Error: update failed: Argument list too long");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_remove_invokes_delete() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| {
                args_eq(
                    args,
                    &["map", "delete", "id", "12", "key", "hex", "0a", "00", "00", "05"],
                )
            })
            .times(1)
            .returning(|_, _| Ok(ok("")));

        let change = backend(mock).remove(&addr("10.0.0.5")).unwrap();
        assert_eq!(change, Change::Applied);
    }

    #[test]
    fn test_remove_absent_is_not_an_error() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("delete"))
            .times(2)
            .returning(|_, _| Ok(failed("Error: delete failed: No such file or directory")));

        let live = backend(mock);
        assert_eq!(live.remove(&addr("10.0.0.5")).unwrap(), Change::Unchanged);
        assert_eq!(live.remove(&addr("10.0.0.5")).unwrap(), Change::Unchanged);
    }

    #[test]
    fn test_list_parses_dump() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args_eq(args, &["map", "dump", "id", "12"]))
            .returning(|_, _| {
                Ok(ok("key: 0a 00 00 09  value: 01\n\
                       key: 0a 00 00 02  value: 01\n\
                       Found 2 elements\n"))
            });

        let entries: Vec<String> = backend(mock).list().unwrap().collect();
        // Tool order, not sorted
        assert_eq!(entries, vec!["10.0.0.9", "10.0.0.2"]);
    }

    #[test]
    fn test_list_dump_failure_is_table_not_found() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("dump"))
            .returning(|_, _| Ok(failed("Error: get map by id (12): No such file or directory")));

        let result = backend(mock).list();
        assert!(matches!(result, Err(BlocklistError::TableNotFound(_))));
    }

    #[test]
    fn test_clear_deletes_dumped_entries() {
        let mut mock = MockCommandExecutor::new();
        let mut seq = Sequence::new();

        mock.expect_execute()
            .withf(|_, args| is_map_list(args))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(ok(MAP_LIST)));
        mock.expect_execute()
            .withf(|_, args| args_eq(args, &["map", "dump", "id", "12"]))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| {
                Ok(ok("key: 0a 00 00 01  value: 01\n\
                       key: 0a 00 00 02  value: 01\n\
                       key: 0a 00 00 03  value: 01\n\
                       Found 3 elements\n"))
            });
        // One entry vanished concurrently before we got to it
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("delete"))
            .times(3)
            .in_sequence(&mut seq)
            .returning(|_, args| {
                if args.last().map(String::as_str) == Some("02") {
                    Ok(failed("Error: delete failed: No such file or directory"))
                } else {
                    Ok(ok(""))
                }
            });

        assert_eq!(backend(mock).clear().unwrap(), 2);
    }

    #[test]
    fn test_clear_empty_map() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("dump"))
            .returning(|_, _| Ok(ok("Found 0 elements\n")));

        assert_eq!(backend(mock).clear().unwrap(), 0);
    }

    #[test]
    fn test_missing_table_fails_every_operation_without_writes() {
        let mut mock = MockCommandExecutor::new();
        // Only map list is ever invoked; any other call fails the test
        mock.expect_execute()
            .withf(|_, args| is_map_list(args))
            .times(4)
            .returning(|_, _| Ok(ok("3: array  name pkt_count  flags 0x0\n\tkey 4B  value 8B\n")));

        let live = backend(mock);
        assert!(matches!(
            live.add(&addr("10.0.0.1")),
            Err(BlocklistError::TableNotFound(_))
        ));
        assert!(matches!(
            live.remove(&addr("10.0.0.1")),
            Err(BlocklistError::TableNotFound(_))
        ));
        assert!(matches!(live.list(), Err(BlocklistError::TableNotFound(_))));
        assert!(matches!(live.clear(), Err(BlocklistError::TableNotFound(_))));
    }

    #[test]
    fn test_stats_with_counters() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, MAP_LIST);
        mock.expect_execute()
            .withf(|_, args| args_eq(args, &["map", "dump", "id", "12"]))
            .returning(|_, _| Ok(ok("key: 0a 00 00 01  value: 01\nFound 1 element\n")));
        mock.expect_execute()
            .withf(|_, args| args_eq(args, &["map", "dump", "id", "3"]))
            .returning(|_, _| {
                let hex = |bytes: &[u8]| {
                    bytes
                        .iter()
                        .map(|b| format!("{:02x}", b))
                        .collect::<Vec<_>>()
                        .join(" ")
                };
                Ok(ok(&format!(
                    "key: {}  value: {}\nkey: {}  value: {}\n",
                    hex(&0u32.to_ne_bytes()),
                    hex(&100u64.to_ne_bytes()),
                    hex(&1u32.to_ne_bytes()),
                    hex(&7u64.to_ne_bytes()),
                )))
            });

        let stats = backend(mock).stats().unwrap();
        assert_eq!(stats.backend, BackendKind::Live);
        assert_eq!(stats.blocked_rules, 1);
        assert_eq!(stats.traffic, Some(TrafficStats::new(100, 7, false)));
    }

    #[test]
    fn test_stats_without_counter_map() {
        let mut mock = MockCommandExecutor::new();
        expect_map_list(&mut mock, "12: hash  name blocked_ips  flags 0x0\n\tkey 4B  value 1B\n");
        mock.expect_execute()
            .withf(|_, args| args.get(1).map(String::as_str) == Some("dump"))
            .returning(|_, _| Ok(ok("key: 0a 00 00 01  value: 01\nkey: 0a 00 00 02  value: 01\n")));

        let stats = backend(mock).stats().unwrap();
        assert_eq!(stats.blocked_rules, 2);
        assert!(stats.traffic.is_none());
    }

    #[test]
    fn test_custom_tool_path() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|cmd, _| cmd == "/usr/sbin/bpftool")
            .returning(|_, args| {
                if is_map_list(args) {
                    Ok(ok(MAP_LIST))
                } else {
                    Ok(ok(""))
                }
            });

        let config = Config {
            tool_path: "/usr/sbin/bpftool".to_string(),
            ..Config::default()
        };
        let live = LiveBackend::with_executor(mock, &config);
        assert!(live.add(&addr("10.0.0.1")).is_ok());
    }
}
