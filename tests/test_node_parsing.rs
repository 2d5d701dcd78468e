//! Parsing of scheduler node listings

use nodetest::scheduler::{LsfInterface, PbsInterface};
use regex::Regex;
use rstest::rstest;

const BHOSTS_OUTPUT: &str = "\
HOST_NAME          STATUS       JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV
ys0101-ib          closed          -     32     16     16      0      0      0
ys0102-ib          closed          -     32     16     16      0      0      0
ys0103-ib          closed          -     32     16     16      0      0      0
ys0104-ib          closed          -     32     16     16      0      0      0
ys0105-ib          closed          -     32     16     16      0      0      0
ys0106-ib          closed          -     32     16     16      0      0      0
ys0107-ib          closed          -     32     16     16      0      0      0
ys0108-ib          closed          -     32     16     16      0      0      0
ys0109-ib          closed          -     32     16     16      0      0      0
ys6363-ib          closed          -     32     16     16      0      0      0
ys6364-ib          closed          -     32     16     16      0      0      0
ys6365-ib          closed          -     32     16     16      0      0      0
ys6366-ib          closed          -     32     16     16      0      0      0
ys6367-ib          closed          -     32     16     16      0      0      0
ys6368-ib          closed          -     32      8      8      0      0      0
ys6369-ib          closed          -     32     16     16      0      0      0
ys6370-ib          closed          -     32      4      4      0      0      0
ys6371-ib          closed          -     32     16     16      0      0      0
ys6372-ib          closed          -     32     16     16      0      0      0
ys0146-ib          ok              -     32      0      0      0      0      0
ys0214-ib          ok              -     32      0      0      0      0      0
ys0216-ib          ok              -     32      0      0      0      0      0
ys0436-ib          ok              -     32      0      0      0      0      0
ys0438-ib          ok              -     32      0      0      0      0      0
ys0439-ib          ok              -     32      0      0      0      0      0
ys0440-ib          ok              -     32      0      0      0      0      0
ys0442-ib          ok              -     32      0      0      0      0      0
ys2667-ib          ok              -     32     16      0      0      0     16
ys2869-ib          ok              -     32     16      0      0      0     16
";

const PBSNODES_OUTPUT: &str = "\
r1i0n0
     Mom = r1i0n0.ib0.cheyenne.ucar.edu
     state = free
     resources_available.Qlist = system,special,ampsrt
     resv_enable = True

r1i0n1
     Mom = r1i0n1.ib0.cheyenne.ucar.edu
     state = free
     resv = R2210539.chadmin1
     resources_available.Qlist = system,special,ampsrt
     resv_enable = True

r1i0n2
     Mom = r1i0n2.ib0.cheyenne.ucar.edu
     state = free
     resources_available.Qlist = casper
     resv_enable = True

r1i0n3
     Mom = r1i0n3.ib0.cheyenne.ucar.edu
     resources_available.Qlist = system,special,ampsrt
     resv = R2210539.chadmin1
     resv_enable = True
";

fn any() -> Regex {
    Regex::new(".").unwrap()
}

// ============== LSF ==============

#[rstest]
fn test_bhosts_keeps_only_available_hosts_in_order() {
    let hosts = LsfInterface::parse_hosts(BHOSTS_OUTPUT, &any());
    assert_eq!(BHOSTS_OUTPUT.lines().count(), 30);
    assert_eq!(
        hosts,
        vec![
            "ys0146-ib", "ys0214-ib", "ys0216-ib", "ys0436-ib", "ys0438-ib", "ys0439-ib",
            "ys0440-ib", "ys0442-ib", "ys2667-ib", "ys2869-ib",
        ]
    );
}

#[rstest]
#[case("ys04", 5)]
#[case("ys2", 2)]
#[case("ys01", 1)]
#[case("^ys0146", 1)]
fn test_bhosts_name_filter(#[case] pattern: &str, #[case] expected: usize) {
    let filter = Regex::new(pattern).unwrap();
    assert_eq!(LsfInterface::parse_hosts(BHOSTS_OUTPUT, &filter).len(), expected);
}

#[rstest]
fn test_bhosts_ignores_indented_lines() {
    let listing = "ys0146-ib   ok   -  32  0  0  0  0  0\n    ys0147-ib ok\n";
    assert_eq!(LsfInterface::parse_hosts(listing, &any()), vec!["ys0146-ib"]);
}

// ============== PBS ==============

#[rstest]
fn test_stanza_emitted_only_for_matching_queue() {
    let inventory = PbsInterface::parse_node_stanzas(PBSNODES_OUTPUT, "special", &any());
    assert_eq!(inventory.names(), vec!["r1i0n0", "r1i0n1", "r1i0n3"]);

    let casper = PbsInterface::parse_node_stanzas(PBSNODES_OUTPUT, "casper", &any());
    assert_eq!(casper.names(), vec!["r1i0n2"]);
}

#[rstest]
fn test_reservation_marker_before_queue_line_sets_flag() {
    let inventory = PbsInterface::parse_node_stanzas(PBSNODES_OUTPUT, "special", &any());
    // r1i0n1 lists its reservation before the queue line; r1i0n3 after it, so the
    // stanza has already been emitted when the marker appears.
    assert_eq!(inventory.reserved_flags(), vec![false, true, false]);
}

#[rstest]
fn test_reservation_queue_does_not_flag_nodes() {
    let inventory = PbsInterface::parse_node_stanzas(PBSNODES_OUTPUT, "R2210539", &any());
    assert_eq!(inventory.names(), vec!["r1i0n1", "r1i0n3"]);
    assert_eq!(inventory.num_reserved(), 0);
}

#[rstest]
fn test_stanza_name_filter() {
    let filter = Regex::new("n[01]$").unwrap();
    let inventory = PbsInterface::parse_node_stanzas(PBSNODES_OUTPUT, "special", &filter);
    assert_eq!(inventory.names(), vec!["r1i0n0", "r1i0n1"]);
}

#[rstest]
fn test_new_stanza_resets_reserved_flag() {
    let listing = "\
a1
     resv = R1.server
b1
     resources_available.Qlist = regular
";
    let inventory = PbsInterface::parse_node_stanzas(listing, "regular", &any());
    assert_eq!(inventory.names(), vec!["b1"]);
    assert_eq!(inventory.reserved_flags(), vec![false]);
}

#[rstest]
fn test_resv_enable_is_not_a_reservation() {
    let listing = "\
a1
     resv_enable = True
     resources_available.Qlist = regular
";
    let inventory = PbsInterface::parse_node_stanzas(listing, "regular", &any());
    assert_eq!(inventory.reserved_flags(), vec![false]);
}
