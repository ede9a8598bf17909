//! Tokenizer and burst member list behaviour on real P10 traffic.

use slirc_p10::{Line, MemberFlags, format_members, irc_to_lower, parse_members};

#[test]
fn registration_line_fields() {
    let line = Line::parse("AB N Nick 1 1700000000 ident host +r Account:111:222 B]AAAB ABAAA :Real Name");
    assert_eq!(line.source(), Some("AB"));
    assert_eq!(line.command(), Some("N"));
    assert_eq!(line.get(2), Some("Nick"));
    assert_eq!(line.trailing_index(7), Some(11));
    assert_eq!(line.trailing(7), Some("Real Name"));
}

#[test]
fn server_line_is_unprefixed() {
    let line = Line::parse("SERVER hub.example.net 1 1700000000 1700000000 J10 ABAP] +h6 :Hub\r\n");
    assert!(line.is_unprefixed());
    assert_eq!(line.command(), Some("SERVER"));
    assert_eq!(line.get(1), Some("hub.example.net"));
    assert_eq!(line.trailing(2), Some("Hub"));
}

#[test]
fn burst_line_members_and_bans() {
    let line = Line::parse("AB B #Rust 1700000000 +nt ABAAA,ABAAB:o,ABAAC:v :%*!*@bad.host");
    assert_eq!(irc_to_lower(line.get(2).unwrap()), "#rust");
    let members = parse_members(line.get(5).unwrap());
    assert_eq!(members.len(), 3);
    assert_eq!(members[1].flags, MemberFlags::OP);
    assert_eq!(members[2].flags, MemberFlags::VOICE);
    assert_eq!(line.trailing(5), Some("%*!*@bad.host"));
}

#[test]
fn formatted_members_reparse_identically() {
    let members = parse_members("ABAAA:o,ABAAB,ABAAC:v,ABAAD");
    let reparsed = parse_members(&format_members(&members));
    for member in &members {
        assert!(reparsed.contains(member), "{member:?}");
    }
    assert_eq!(reparsed.len(), members.len());
}
