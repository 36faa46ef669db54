// Built-in probe catalogue
//
// Pure configuration: every probe is a ProbeDefinition compiled against the
// supplied runner. A malformed pattern aborts construction of the registry.
use std::sync::Arc;
use std::time::Duration;

use diagnose_core::application::{LongProbe, Probe, Registry};
use diagnose_core::domain::{ProbeDefinition, SkipCheck};
use diagnose_core::port::{CommandRunner, TimeProvider};
use diagnose_core::Result;
use tracing::debug;

use crate::processors;

/// Lists whole SCSI/SATA drives (no partitions), one per line
pub const DRIVE_DEVICES: &str = "ls /dev/sd* | grep -E '^/dev/sd[a-z]+$'";

const USAGE_ROW: &str = r"((?:9[5-9]|100)%[^\n]*)";

pub const CPU_BURN: &str = "stress-ng --cpu 0 --timeout 300s --metrics-brief";
pub const MEM_BURN: &str = "memtester 1G 1";
pub const SMART_TEST: &str =
    "smartctl -t short {device} > /dev/null && sleep 150 && smartctl -l selftest {device}";

pub fn dmesg() -> ProbeDefinition {
    ProbeDefinition::new("dmesg", "dmesg")
        .fail_patterns([
            r"UncorrectableError",
            r"Remounting filesystem read-only",
            r"hung_task_timeout_secs",
            r"BUG: soft lockup",
            r"nfs: server [^\n]* not responding",
            r"invoked oom-killer",
        ])
        .message("no concerning error logs detected")
}

pub fn memory() -> ProbeDefinition {
    ProbeDefinition::new("memory", "free -m")
        .processor(processors::free_memory)
        .message("mem < 90%, swap < 25%")
}

pub fn sensors() -> ProbeDefinition {
    ProbeDefinition::new("sensors", "sensors")
        .processor(processors::temperatures)
        .skip(SkipCheck::tool("which sensors-detect"))
        .requires("lm_sensors")
        .message("temps look adequate")
}

/// System probes in reporting order
pub fn system_definitions() -> Vec<ProbeDefinition> {
    vec![
        // System journals
        dmesg(),
        ProbeDefinition::new("journalctl", r#"journalctl -p 0..3 -xn --since "-240""#)
            .pass_patterns([r"^-- No entries --$"])
            .skip(SkipCheck::tool("which journalctl"))
            .requires("systemd")
            .message("no emergency->error journals in the last 10 days"),
        // Services and limits
        ProbeDefinition::new("systemctl", "systemctl --failed")
            .fail_patterns([r"\sfailed\s"])
            .skip(SkipCheck::tool("which systemctl"))
            .message("no failed services"),
        ProbeDefinition::new("file_desc", "lsof | wc -l && sysctl fs.file-max")
            .processor(processors::current_max("file descriptor"))
            .skip(SkipCheck::tool("which lsof"))
            .requires("lsof")
            .message("file descriptors < 95% usage"),
        ProbeDefinition::new(
            "threads",
            "ps -eo nlwp | tail -n +2 | awk '{ num_threads += $1 } END { print num_threads }' \
             && (ulimit -u 2>/dev/null || ulimit -p)",
        )
        .processor(processors::current_max("thread"))
        .message("threads < 95% usage"),
        // Drives and filesystems
        ProbeDefinition::new("hdparm", "hdparm -I {device}")
            .devices(DRIVE_DEVICES)
            .fail_patterns([
                r"Security:.*?^\s*(locked)\s*$",
                r"Security:.*?^\s*(frozen)\s*$",
                r"(Checksum:[ \t]*(?:[^c\s]|c[^o\s])[^\n]*)",
            ])
            .skip(SkipCheck::tool("which hdparm"))
            .requires("hdparm")
            .message("hard drives unlocked"),
        ProbeDefinition::new("df", "df")
            .fail_patterns([USAGE_ROW])
            .message("disk usage < 95%"),
        ProbeDefinition::new("df_inode", "df -i")
            .fail_patterns([USAGE_ROW])
            .message("inodes < 95%"),
        ProbeDefinition::new("smart", "smartctl -A {device}")
            .devices(DRIVE_DEVICES)
            .processor(processors::smart_attributes)
            .skip(SkipCheck::tool("which smartctl"))
            .requires("smartmontools")
            .message("drives in usable health"),
        // Network
        ProbeDefinition::new("iplink", "ip link")
            .fail_patterns([r"^\d+:[^\n]*state DOWN[^\n]*$"])
            .message("links up"),
        ProbeDefinition::new("internet", "ping -c 1 8.8.8.8")
            .fail_patterns([r"0 received, 100% packet loss"])
            .pass_patterns([r"\d+ received"])
            .message("connected to google DNS"),
        // Misc hardware
        memory(),
        sensors(),
    ]
}

/// Registry of every system probe, compiled against `runner`
///
/// # Errors
/// - AppError::Pattern if a catalogue pattern fails to compile
pub fn system_registry(runner: Arc<dyn CommandRunner>) -> Result<Registry> {
    let mut registry = Registry::new();
    for definition in system_definitions() {
        let probe = Probe::new(definition, Arc::clone(&runner))?;
        registry.register(Arc::new(probe))?;
    }
    debug!(probes = registry.len(), "System registry built");
    Ok(registry)
}

/// Registry of the stress probes, each watched by its checkers every `poll_interval`
///
/// # Errors
/// - AppError::Pattern if a catalogue pattern fails to compile
pub fn long_registry(
    runner: Arc<dyn CommandRunner>,
    time_provider: Arc<dyn TimeProvider>,
    poll_interval: Duration,
) -> Result<Registry> {
    let checker = |definition: ProbeDefinition| -> Result<Arc<Probe>> {
        Ok(Arc::new(Probe::new(definition, Arc::clone(&runner))?))
    };

    let cpu_burn = LongProbe::new(
        ProbeDefinition::new("cpu_burn", CPU_BURN)
            .fail_patterns([r"^(stress-ng: (?:fail|error):[^\n]*)$"])
            .pass_patterns([r"\bsuccessful run completed"])
            .skip(SkipCheck::tool("which stress-ng"))
            .requires("stress-ng")
            .message("cpu survived 5 minutes of load"),
        Arc::clone(&runner),
        Arc::clone(&time_provider),
        vec![checker(sensors())?],
        poll_interval,
    )?;

    // Only kernel messages logged during the run count against memtester
    let mem_burn = LongProbe::new(
        ProbeDefinition::new("mem_burn", MEM_BURN)
            .fail_patterns([r"(FAILURE:[^\n]*)"])
            .pass_patterns([r"^Done\.$"])
            .skip(SkipCheck::tool("which memtester"))
            .requires("memtester")
            .message("memory patterns verified"),
        Arc::clone(&runner),
        Arc::clone(&time_provider),
        vec![checker(dmesg().since_start())?],
        poll_interval,
    )?;

    let smart_test = LongProbe::new(
        ProbeDefinition::new("smart_test", SMART_TEST)
            .devices(DRIVE_DEVICES)
            .fail_patterns([r"^(# *1 [^\n]*(?:failure|Aborted)[^\n]*)$"])
            .pass_patterns([r"^# *1 [^\n]*Completed without error"])
            .skip(SkipCheck::tool("which smartctl"))
            .requires("smartmontools")
            .message("short self-test completed"),
        Arc::clone(&runner),
        time_provider,
        Vec::new(),
        poll_interval,
    )?
    .sequential_only();

    let mut registry = Registry::new();
    registry.register(Arc::new(cpu_burn))?;
    registry.register(Arc::new(mem_burn))?;
    registry.register(Arc::new(smart_test))?;
    debug!(probes = registry.len(), "Long registry built");
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diagnose_core::application::Diagnostic;
    use diagnose_core::domain::Outcome;
    use diagnose_core::port::command_runner::mocks::{MockCommandRunner, ProcessScript};
    use diagnose_core::port::time_provider::mocks::MockTimeProvider;
    use tokio_test::assert_ok;

    fn definition(name: &str) -> ProbeDefinition {
        system_definitions()
            .into_iter()
            .find(|d| d.name == name)
            .unwrap()
    }

    async fn evaluate(name: &str, runner: Arc<MockCommandRunner>) -> Outcome {
        let probe = Probe::new(definition(name), runner).unwrap();
        probe.evaluate().await.unwrap()
    }

    async fn evaluate_output(name: &str, output: &str) -> Outcome {
        let runner = Arc::new(MockCommandRunner::new());
        runner.respond(definition(name).command.clone(), output);
        evaluate(name, runner).await
    }

    #[test]
    fn test_catalogue_compiles_in_order() {
        let registry = assert_ok!(system_registry(Arc::new(MockCommandRunner::new())));

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(
            names,
            vec![
                "dmesg", "journalctl", "systemctl", "file_desc", "threads", "hdparm", "df",
                "df_inode", "smart", "iplink", "internet", "memory", "sensors",
            ]
        );
    }

    #[test]
    fn test_long_catalogue_compiles() {
        let registry = assert_ok!(long_registry(
            Arc::new(MockCommandRunner::new()),
            Arc::new(MockTimeProvider::new(0)),
            Duration::from_secs(1),
        ));

        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["cpu_burn", "mem_burn", "smart_test"]);
        assert!(!registry.get("smart_test").unwrap().runs_in_parallel());
    }

    #[tokio::test]
    async fn test_iplink() {
        let up = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536 qdisc noqueue state UNKNOWN\n\
                  2: eth0: <BROADCAST,MULTICAST,UP> mtu 1500 qdisc mq state UP mode DEFAULT\n";
        let down = "2: eth1: <BROADCAST,MULTICAST> mtu 1500 qdisc noop state DOWN mode DEFAULT\n";

        assert!(evaluate_output("iplink", up).await.is_passed());
        let outcome = evaluate_output("iplink", &format!("{}{}", up, down)).await;
        assert!(outcome.failures()[0].contains("eth1"));
    }

    #[tokio::test]
    async fn test_memory() {
        let output = |used: u32| {
            format!(
                "       total  used  free  shared  buff/cache  available\n\
                 Mem:   1000   {}    10    1       20          30\n\
                 Swap:  0      0     0\n",
                used
            )
        };

        let outcome = evaluate_output("memory", &output(950)).await;
        assert!(outcome.failures()[0].contains("mem usage > 90%"));
        assert_eq!(
            evaluate_output("memory", &output(800)).await,
            Outcome::Passed {
                message: "mem < 90%, swap < 25%".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_df() {
        let output = "Filesystem     1K-blocks     Used Available Use% Mounted on\n\
                      /dev/sda1       41152736 39094100   2058636  96% /\n\
                      tmpfs             817604        0    817604   0% /run/user\n";

        let outcome = evaluate_output("df", output).await;

        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reasons.len(), 1);
        assert!(failures[0].contains("96% /"));
    }

    #[tokio::test]
    async fn test_journalctl_requires_empty_journal() {
        let command = definition("journalctl").command;
        let runner = Arc::new(MockCommandRunner::new());
        runner
            .respond("which journalctl", "/usr/bin/journalctl\n")
            .respond(command.clone(), "Oct 18 kernel: something bad\n")
            .respond(command, "-- No entries --\n");

        assert!(evaluate("journalctl", runner.clone()).await.is_failed());
        assert!(evaluate("journalctl", runner).await.is_passed());
    }

    #[tokio::test]
    async fn test_sensors_skipped_without_lm_sensors() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.respond("which sensors-detect", "");

        let outcome = evaluate("sensors", runner.clone()).await;

        assert_eq!(
            outcome,
            Outcome::Skipped {
                requires: Some("lm_sensors".to_string())
            }
        );
        assert_eq!(runner.call_count("sensors"), 0);
    }

    #[tokio::test]
    async fn test_hdparm_security() {
        let healthy = "Security:\n\
                       \tMaster password revision code = 65534\n\
                       \t\tsupported\n\
                       \tnot\tenabled\n\
                       \tnot\tlocked\n\
                       \tnot\tfrozen\n\
                       Checksum: correct\n";
        let frozen = healthy.replace("\tnot\tfrozen", "\t\tfrozen");

        let runner = Arc::new(MockCommandRunner::new());
        runner.respond("which hdparm", "/sbin/hdparm\n");
        runner.respond(DRIVE_DEVICES, "/dev/sda\n/dev/sdb\n");
        runner.respond("hdparm -I /dev/sda", healthy);
        runner.respond("hdparm -I /dev/sdb", frozen);

        let outcome = evaluate("hdparm", runner).await;

        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].command, "hdparm -I /dev/sdb");
        assert!(failures[0].contains("frozen"));
        assert!(!failures[0].contains("locked"));
    }

    #[tokio::test]
    async fn test_hdparm_bad_checksum() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.respond("which hdparm", "/sbin/hdparm\n");
        runner.respond(DRIVE_DEVICES, "/dev/sda\n");
        runner.respond("hdparm -I /dev/sda", "Checksum: 0x1f incorrect\n");

        let outcome = evaluate("hdparm", runner).await;

        assert!(outcome.failures()[0].contains("Checksum: 0x1f"));
    }

    #[tokio::test]
    async fn test_hdparm_locked() {
        let runner = Arc::new(MockCommandRunner::new());
        runner.respond("which hdparm", "/sbin/hdparm\n");
        runner.respond(DRIVE_DEVICES, "/dev/sda\n");
        runner.respond(
            "hdparm -I /dev/sda",
            "Security:\n\t\tsupported\n\t\tenabled\n\t\tlocked\n\tnot\tfrozen\nChecksum: correct\n",
        );

        let outcome = evaluate("hdparm", runner).await;

        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].reasons.len(), 1);
        assert!(failures[0].contains("locked"));
    }

    #[tokio::test]
    async fn test_internet() {
        assert!(evaluate_output("internet", "1 packets transmitted, 1 received, 0% packet loss")
            .await
            .is_passed());
        assert!(evaluate_output("internet", "1 packets transmitted, 0 received, 100% packet loss")
            .await
            .is_failed());
        assert!(evaluate_output("internet", "connect: Network is unreachable")
            .await
            .is_failed());
    }

    #[tokio::test]
    async fn test_cpu_burn_stopped_by_overheating() {
        let runner = Arc::new(MockCommandRunner::new());
        let clock = Arc::new(MockTimeProvider::new(0));
        runner.respond("which stress-ng", "/usr/bin/stress-ng\n");
        runner.respond("which sensors-detect", "/usr/sbin/sensors-detect\n");
        runner.respond("sensors", "Core 0:  +60.0°C  (high = +80.0°C, crit = +100.0°C)\n");
        runner.respond("sensors", "Core 0:  +91.0°C  (high = +80.0°C, crit = +100.0°C)\n");
        let process = runner.background(
            CPU_BURN,
            ProcessScript::new(100, "stress-ng: info:  [311] successful run completed in 2.00s"),
        );
        let registry = assert_ok!(long_registry(runner.clone(), clock, Duration::from_secs(1)));

        let outcome = registry.get("cpu_burn").unwrap().evaluate().await.unwrap();

        assert!(process.killed());
        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].command, "sensors");
    }

    /// Every stress tool installed, no lm_sensors, one drive
    fn stress_host() -> Arc<MockCommandRunner> {
        let runner = Arc::new(MockCommandRunner::new());
        runner
            .respond("which stress-ng", "/usr/bin/stress-ng\n")
            .respond("which memtester", "/usr/sbin/memtester\n")
            .respond("which smartctl", "/usr/sbin/smartctl\n")
            .respond("which sensors-detect", "")
            .respond("dmesg", "")
            .respond(DRIVE_DEVICES, "/dev/sda\n");
        runner
    }

    async fn stress_outcome(runner: Arc<MockCommandRunner>, name: &str) -> Outcome {
        let clock = Arc::new(MockTimeProvider::new(0));
        let registry = assert_ok!(long_registry(runner, clock, Duration::from_secs(1)));
        assert_ok!(registry.get(name).unwrap().evaluate().await)
    }

    fn sda_self_test() -> String {
        SMART_TEST.replace("{device}", "/dev/sda")
    }

    const MEMTESTER_HEADER: &str = "memtester version 4.5.1 (64-bit)\n\
        pagesize is 4096\n\
        want 1024MB (1073741824 bytes)\n\
        got  1024MB (1073741824 bytes), trying mlock ...locked.\n\
        Loop 1/1:\n\
          Stuck Address       : ok\n";

    #[tokio::test]
    async fn test_cpu_burn_output() {
        let runner = stress_host();
        runner.background(
            CPU_BURN,
            ProcessScript::new(2, "stress-ng: info:  [311] dispatching hogs: 8 cpu\n\
                stress-ng: info:  [311] successful run completed in 300.02s (5 mins, 0.02 secs)\n"),
        );
        assert!(stress_outcome(runner, "cpu_burn").await.is_passed());

        let runner = stress_host();
        runner.background(
            CPU_BURN,
            ProcessScript::new(2, "stress-ng: info:  [311] dispatching hogs: 8 cpu\n\
                stress-ng: fail:  [312] stress-ng-cpu: matrix product checksum mismatch\n\
                stress-ng: info:  [311] unsuccessful run completed in 300.02s\n"),
        );
        let outcome = stress_outcome(runner, "cpu_burn").await;
        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].command, CPU_BURN);
        assert!(failures[0].contains("stress-ng: fail:  [312] stress-ng-cpu"));
    }

    #[tokio::test]
    async fn test_mem_burn_output() {
        let runner = stress_host();
        runner.background(
            MEM_BURN,
            ProcessScript::new(2, format!("{}  Random Value        : ok\nDone.\n", MEMTESTER_HEADER)),
        );
        assert!(stress_outcome(runner, "mem_burn").await.is_passed());

        let runner = stress_host();
        runner.background(
            MEM_BURN,
            ProcessScript::new(
                2,
                format!(
                    "{}  Random Value        : FAILURE: 0x3c8e2d7f != 0x3c8e2d7e at offset 0x0001a2c0.\nDone.\n",
                    MEMTESTER_HEADER
                ),
            ),
        );
        let outcome = stress_outcome(runner, "mem_burn").await;
        assert!(outcome.failures()[0].contains("FAILURE: 0x3c8e2d7f != 0x3c8e2d7e"));
    }

    #[tokio::test]
    async fn test_mem_burn_without_completion_fails() {
        let runner = stress_host();
        runner.background(MEM_BURN, ProcessScript::new(1, ""));

        assert!(stress_outcome(runner, "mem_burn").await.is_failed());
    }

    #[tokio::test]
    async fn test_mem_burn_ignores_kernel_log_from_before_the_run() {
        let runner = Arc::new(MockCommandRunner::new());
        runner
            .respond("which memtester", "/usr/sbin/memtester\n")
            .respond("dmesg", "[12.000] foo invoked oom-killer\n");
        let process = runner.background(MEM_BURN, ProcessScript::new(5, "Done.\n"));

        let outcome = stress_outcome(runner.clone(), "mem_burn").await;

        assert!(outcome.is_passed());
        assert!(!process.killed());
        assert_eq!(process.polls(), 6);
        assert_eq!(runner.call_count("dmesg"), 6);
    }

    const SELFTEST_HEADER: &str = "SMART Self-test log structure revision number 1\n\
        Num  Test_Description    Status                  Remaining  LifeTime(hours)  LBA_of_first_error\n";

    #[tokio::test]
    async fn test_smart_test_output() {
        let runner = stress_host();
        runner.background(
            sda_self_test(),
            ProcessScript::new(
                2,
                format!(
                    "{}# 1  Short offline       Completed without error       00%      4312         -\n\
                     # 2  Short offline       Completed: read failure       90%      4100         1234\n",
                    SELFTEST_HEADER
                ),
            ),
        );
        assert!(stress_outcome(runner, "smart_test").await.is_passed());

        let runner = stress_host();
        runner.background(
            sda_self_test(),
            ProcessScript::new(
                2,
                format!(
                    "{}# 1  Short offline       Completed: read failure       90%      4312         1234\n\
                     # 2  Short offline       Completed without error       00%      4100         -\n",
                    SELFTEST_HEADER
                ),
            ),
        );
        let outcome = stress_outcome(runner, "smart_test").await;
        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].command, sda_self_test());
        assert!(failures[0].contains("Completed: read failure"));
    }

    #[tokio::test]
    async fn test_smart_test_without_log_fails() {
        let runner = stress_host();
        runner.background(sda_self_test(), ProcessScript::new(2, ""));

        assert!(stress_outcome(runner, "smart_test").await.is_failed());
    }
}
