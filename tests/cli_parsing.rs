use clap::Parser;
use installtrack::cli::{Cli, Commands, DeviceCommands, InstallationCommands, SchedulerCommands};
use installtrack::domain::models::{InstallationStatus, ReadingUnit, Role};
use uuid::Uuid;

#[test]
fn test_parse_installation_submit() {
    let cli = Cli::try_parse_from([
        "installtrack",
        "installation",
        "submit",
        "--device",
        "DEV-1",
        "--location",
        "42",
        "--reading",
        "1.2",
        "--unit",
        "m",
        "--lat",
        "-33.9",
        "--lon",
        "18.4",
        "--actor-id",
        "inst-1",
        "--role",
        "scoped-installer",
        "--actor-team",
        "t1",
    ])
    .unwrap();

    match cli.command {
        Commands::Installation(args) => match args.command {
            InstallationCommands::Submit {
                device,
                location,
                reading,
                unit,
                lat,
                actor,
                ..
            } => {
                assert_eq!(device, "DEV-1");
                assert_eq!(location, "42");
                assert!((reading - 1.2).abs() < f64::EPSILON);
                assert_eq!(unit, ReadingUnit::M);
                assert_eq!(lat, Some(-33.9));
                assert_eq!(actor.role, Role::ScopedInstaller);
                let actor = actor.actor();
                assert_eq!(actor.team_id.as_deref(), Some("t1"));
            }
            _ => panic!("Wrong installation command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_reject_requires_reason() {
    let id = Uuid::new_v4().to_string();
    let missing = Cli::try_parse_from([
        "installtrack", "installation", "reject", &id, "--actor-id", "ver-1", "--role", "verifier",
    ]);
    assert!(missing.is_err());

    let cli = Cli::try_parse_from([
        "installtrack",
        "--json",
        "installation",
        "reject",
        &id,
        "--reason",
        "photo shows wrong pole",
        "--actor-id",
        "ver-1",
        "--role",
        "verifier",
    ])
    .unwrap();
    assert!(cli.json);
    match cli.command {
        Commands::Installation(args) => match args.command {
            InstallationCommands::Reject { id: parsed, reason, .. } => {
                assert_eq!(parsed.to_string(), id);
                assert_eq!(reason, "photo shows wrong pole");
            }
            _ => panic!("Wrong installation command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_edit_clear_coordinates_conflicts_with_lat() {
    let id = Uuid::new_v4().to_string();
    let conflicting = Cli::try_parse_from([
        "installtrack",
        "installation",
        "edit",
        &id,
        "--lat",
        "1.0",
        "--clear-coordinates",
        "--actor-id",
        "ver-1",
    ]);
    assert!(conflicting.is_err());
}

#[test]
fn test_parse_list_filters() {
    let cli = Cli::try_parse_from([
        "installtrack",
        "installation",
        "list",
        "--status",
        "flagged",
        "--team",
        "t1",
        "--limit",
        "20",
    ])
    .unwrap();
    match cli.command {
        Commands::Installation(args) => match args.command {
            InstallationCommands::List {
                status, team, limit, ..
            } => {
                assert_eq!(status, Some(InstallationStatus::Flagged));
                assert_eq!(team.as_deref(), Some("t1"));
                assert_eq!(limit, Some(20));
            }
            _ => panic!("Wrong installation command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_device_open_box() {
    let cli = Cli::try_parse_from([
        "installtrack",
        "device",
        "open-box",
        "--team",
        "t1",
        "--box",
        "B7",
        "--actor-id",
        "adm-1",
        "--role",
        "admin",
    ])
    .unwrap();
    match cli.command {
        Commands::Device(args) => match args.command {
            DeviceCommands::OpenBox {
                team, box_number, ..
            } => {
                assert_eq!(team, "t1");
                assert_eq!(box_number, "B7");
            }
            _ => panic!("Wrong device command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_parse_scheduler_run_profile() {
    let cli = Cli::try_parse_from([
        "installtrack",
        "scheduler",
        "run",
        "--profile",
        "installer",
        "--installer",
        "inst-1",
        "--window-secs",
        "90",
    ])
    .unwrap();
    match cli.command {
        Commands::Scheduler(args) => match args.command {
            SchedulerCommands::Run { profile } => {
                assert_eq!(profile.installer.as_deref(), Some("inst-1"));
                assert_eq!(profile.window_secs, Some(90));
            }
            SchedulerCommands::Sweep { .. } => panic!("Wrong scheduler command"),
        },
        _ => panic!("Wrong top-level command"),
    }
}

#[test]
fn test_unknown_role_rejected() {
    let result = Cli::try_parse_from([
        "installtrack",
        "installation",
        "approve",
        &Uuid::new_v4().to_string(),
        "--actor-id",
        "x",
        "--role",
        "superuser",
    ]);
    assert!(result.is_err());
}

#[test]
fn test_reconcile_takes_an_actor() {
    let id = Uuid::new_v4();
    let cli = Cli::try_parse_from([
        "installtrack",
        "installation",
        "reconcile",
        &id.to_string(),
        "--actor-id",
        "ver-1",
        "--role",
        "verifier",
    ])
    .unwrap();
    match cli.command {
        Commands::Installation(args) => match args.command {
            InstallationCommands::Reconcile { id: parsed, actor } => {
                assert_eq!(parsed, id);
                assert_eq!(actor.actor().role, Role::Verifier);
            }
            _ => panic!("Wrong installation command"),
        },
        _ => panic!("Wrong top-level command"),
    }

    let missing_actor =
        Cli::try_parse_from(["installtrack", "installation", "reconcile", &id.to_string()]);
    assert!(missing_actor.is_err());
}
