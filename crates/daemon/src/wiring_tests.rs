use super::*;
use crate::config::Config;

fn sample_config(dir: &std::path::Path) -> Config {
    let config_path = dir.join("clusters.toml");
    std::fs::write(
        &config_path,
        r#"
            [hpc.expanse]
            ip = "expanse.example.edu"
            port = 22
            root_path = "/scratch/sup"
            job_pool_capacity = 2
            is_community_account = true
            community_login = "supuser"

            [hpc.expanse.slurm_input_rules]
            nodes = 8
            tasks = 8
            cpus_per_task = 16
            memory_per_cpu_bytes = 4000000000
            memory_total_bytes = 32000000000
            gpus = 4
            walltime_secs = 36000

            [hpc.expanse.slurm_global_cap]
            nodes = 50
            tasks = 50
            cpus_per_task = 50
            memory_per_cpu_bytes = 10000000000
            memory_total_bytes = 50000000000
            gpus = 20
            walltime_secs = 36000
        "#,
    )
    .unwrap();
    Config::load_from(dir, &config_path).unwrap()
}

#[test]
fn build_wires_a_supervisor_per_configured_cluster() {
    let dir = tempfile::tempdir().unwrap();
    let config = sample_config(dir.path());
    let wiring = build(&config).unwrap();
    assert_eq!(wiring.supervisor.running_count(&HpcId::new("expanse")), 0);
}

#[test]
fn build_creates_state_directories() {
    let dir = tempfile::tempdir().unwrap();
    let config = sample_config(dir.path());
    build(&config).unwrap();
    assert!(config.git_mirror_root().is_dir());
    assert!(config.local_work_root().is_dir());
}
