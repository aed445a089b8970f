//! Connection string parsing across the inputs the CLI and seeding accept

use chrono::Utc;
use directory::address::{normalize_addr, parse};
use directory::{DirectoryError, Entity, EntityId, Host, NewHost};

const INPUTS: &[&str] = &[
    "sdf.org",
    "sdf.org:22",
    "test@sdf.org:22",
    "test:pw@sdf.org:22",
    "new@whoami.filippo.io",
    "root@10.0.0.5:2222",
    "ops@[2001:db8::1]:22",
    "deploy:s%20cret@db.internal",
];

#[test]
fn test_scheme_is_optional() {
    for raw in INPUTS {
        let bare = parse(raw).unwrap();
        let with_scheme = parse(&format!("ssh://{raw}")).unwrap();
        assert_eq!(bare, with_scheme, "{raw}");
    }
}

#[test]
fn test_scheme_never_stored() {
    for raw in INPUTS {
        let parsed = parse(&format!("ssh://{raw}")).unwrap();
        assert!(!parsed.addr.contains("://"), "{raw}");
        assert!(!parsed.addr.contains('@'), "{raw}");
    }
}

#[test]
fn test_host_url_roundtrip() {
    let hosts = [
        ("sdf", "sdf.org:22", "new"),
        ("whoami", "whoami.filippo.io:22", "test"),
        ("ssh-chat", "chat.shazow.net:22", "test"),
        ("v6", "[::1]:2200", "root"),
    ];

    for (id, (name, addr, user)) in hosts.into_iter().enumerate() {
        let host = Host::from_draft(
            EntityId(id as i64 + 1),
            NewHost::new(name, addr, user),
            Utc::now(),
        );
        let parsed = parse(&host.url()).unwrap();
        assert_eq!(parsed.user, host.user);
        assert_eq!(parsed.addr, host.addr);
        assert_eq!(parsed.host, host.hostname());
    }
}

#[test]
fn test_percent_encoded_password() {
    let parsed = parse("deploy:s%20cret@db.internal").unwrap();
    assert_eq!(parsed.password, "s cret");
    assert_eq!(parsed.addr, "db.internal");
}

#[test]
fn test_written_default_ports_are_kept() {
    for (raw, addr, port) in [
        ("http://u@h:80", "h:80", 80),
        ("https://u@h:443", "h:443", 443),
        ("ftp://ops@jump.example:21", "jump.example:21", 21),
        ("ssh://ops@jump.example:22", "jump.example:22", 22),
    ] {
        let parsed = parse(raw).unwrap();
        assert_eq!(parsed.addr, addr, "{raw}");
        assert_eq!(parsed.port, Some(port), "{raw}");
        assert_eq!(parsed.addr_with_port(2222), addr, "{raw}");
    }

    let implicit = parse("https://u@h").unwrap();
    assert_eq!(implicit.addr, "h");
    assert_eq!(implicit.port, None);
}

#[test]
fn test_errors_carry_input() {
    match parse("ssh://user@host:70000") {
        Err(DirectoryError::MalformedAddress { input, reason }) => {
            assert_eq!(input, "ssh://user@host:70000");
            assert!(!reason.is_empty());
        }
        other => panic!("expected MalformedAddress, got {other:?}"),
    }
}

#[test]
fn test_normalized_addresses_are_stable() {
    for raw in ["sdf.org", "sdf.org:22", "ssh://sdf.org"] {
        let once = normalize_addr(raw, 22).unwrap();
        assert_eq!(once, "sdf.org:22");
        assert_eq!(normalize_addr(&once, 22).unwrap(), once);
    }
}
