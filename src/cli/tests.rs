use super::*;

fn parse_args(argv: &[&str]) -> Args {
    Args::try_parse_from(argv)
        .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
}

#[test]
fn no_subcommand_opens_the_default_worksheet() {
    let args = parse_args(&["quire"]);
    assert!(args.command.is_none());
    assert_eq!(args.server, None);
    assert_eq!(args.log, None);
}

#[test]
fn open_takes_an_optional_worksheet() {
    match parse_args(&["quire", "open", "0xabc"]).command {
        Some(Commands::Open { worksheet }) => assert_eq!(worksheet.as_deref(), Some("0xabc")),
        _ => panic!("expected open"),
    }
    match parse_args(&["quire", "open"]).command {
        Some(Commands::Open { worksheet }) => assert_eq!(worksheet, None),
        _ => panic!("expected open"),
    }
}

#[test]
fn global_flags_work_before_and_after_the_subcommand() {
    let cases: [&[&str]; 2] = [
        &["quire", "--server", "http://localhost:2900", "-l", "q.log", "show", "home"],
        &["quire", "show", "home", "-s", "http://localhost:2900", "--log", "q.log"],
    ];
    for argv in cases {
        let args = parse_args(argv);
        assert_eq!(args.server.as_deref(), Some("http://localhost:2900"), "argv={argv:?}");
        assert_eq!(args.log.as_deref(), Some("q.log"), "argv={argv:?}");
        assert!(matches!(args.command, Some(Commands::Show { ref worksheet }) if worksheet == "home"));
    }
}

#[test]
fn set_without_a_value_parses() {
    match parse_args(&["quire", "set"]).command {
        Some(Commands::Set { key, value }) => {
            assert_eq!(key, None);
            assert_eq!(value, None);
        }
        _ => panic!("expected set"),
    }
    match parse_args(&["quire", "set", "poll-cap-ms", "5000"]).command {
        Some(Commands::Set { key, value }) => {
            assert_eq!(key.as_deref(), Some("poll-cap-ms"));
            assert_eq!(value.as_deref(), Some("5000"));
        }
        _ => panic!("expected set"),
    }
}

#[test]
fn unknown_config_keys_are_rejected_before_touching_the_file() {
    let err = set_config_value("colour", "blue").unwrap_err();
    assert!(err.to_string().starts_with("Unknown config key 'colour'"));
    assert!(unset_config_value("colour").is_err());
}

#[test]
fn show_requires_a_worksheet() {
    assert!(Args::try_parse_from(["quire", "show"]).is_err());
}
