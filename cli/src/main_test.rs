use super::*;

#[test]
fn guard_lines() {
    assert_eq!(decision_line(GuardDecision::Render), "render");
    assert_eq!(decision_line(GuardDecision::Redirect(folio::guard::UNAUTHORIZED_PATH)), "redirect /unauthorized");
}

#[test]
fn section_names_parse() {
    assert_eq!(parse_section("Projects").unwrap(), Section::Projects);
    assert!(matches!(parse_section("blog"), Err(CliError::UnknownSection(name)) if name == "blog"));
}

#[test]
fn otp_email_is_optional() {
    let cli = Cli::try_parse_from(["folio", "otp", "--code", "123456"]).unwrap();
    assert!(matches!(cli.command, Command::Otp { email: None, ref code } if code == "123456"));
}

#[test]
fn guard_defaults_to_admin_route() {
    let cli = Cli::try_parse_from(["folio", "--api-host", "http://localhost:4000", "guard"]).unwrap();
    assert_eq!(cli.api_host.as_deref(), Some("http://localhost:4000"));
    assert!(matches!(cli.command, Command::Guard { public: false }));

    let cli = Cli::try_parse_from(["folio", "guard", "--public"]).unwrap();
    assert!(matches!(cli.command, Command::Guard { public: true }));
}

#[test]
fn content_delete_takes_section_and_id() {
    let cli = Cli::try_parse_from(["folio", "content", "delete", "skills", "s1"]).unwrap();
    let Command::Content(ContentCommand { command: ContentSubcommand::Delete { section, id } }) = cli.command else {
        panic!("expected content delete");
    };
    assert_eq!((section.as_str(), id.as_str()), ("skills", "s1"));
}

#[test]
fn admin_email_flag_alone_is_enough() {
    let cli = Cli::try_parse_from(["folio", "--admin-email", "admin@example.com", "whoami"]).unwrap();
    let config = load_config_with(&cli, |_| None).unwrap();
    assert_eq!(config.admin_email, "admin@example.com");
}

#[test]
fn flags_shadow_environment_per_key() {
    let cli = Cli::try_parse_from(["folio", "--api-host", "http://flag:4000/", "--storage", "/tmp/folio.json", "whoami"]).unwrap();
    let config = load_config_with(&cli, |key| match key {
        "FOLIO_API_HOST" => Some("http://env:4000".to_owned()),
        "FOLIO_ADMIN_EMAIL" => Some("env@example.com".to_owned()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.api_host, "http://flag:4000");
    assert_eq!(config.storage_path, PathBuf::from("/tmp/folio.json"));
}
