use netshaper_cgroup::{ControlFile, Error, Hierarchy, BURST_FILE, RATE_FILE, STATS_FILE};
use netshaper_core::ShaperOptions;

#[test]
fn child_inherits_written_limits() {
    let hierarchy = Hierarchy::default();
    let root = hierarchy.create_group(None).unwrap();

    hierarchy.write_file(root, RATE_FILE, "5000\n").unwrap();
    hierarchy.write_file(root, BURST_FILE, "250\n").unwrap();

    let child = hierarchy.create_group(Some(root)).unwrap();
    assert_eq!(hierarchy.read_file(child, RATE_FILE).unwrap(), "5000\n");
    assert_eq!(hierarchy.read_file(child, BURST_FILE).unwrap(), "250\n");

    // Later changes to the parent are not propagated.
    hierarchy.write_file(root, RATE_FILE, "1").unwrap();
    assert_eq!(hierarchy.read_file(child, RATE_FILE).unwrap(), "5000\n");
}

#[test]
fn every_file_is_readable() {
    let hierarchy = Hierarchy::new(ShaperOptions::default().default_rate(7).default_burst(3));
    let group = hierarchy.create_group(None).unwrap();

    for file in ControlFile::ALL {
        let contents = hierarchy.read_file(group, file.name()).unwrap();
        assert!(contents.ends_with('\n'), "{file} should end with a newline");
    }

    let stats = hierarchy.read_file(group, STATS_FILE).unwrap();
    assert!(stats.contains("rate: 7 bytes/s\n"));
    assert!(stats.contains("burst: 3 bytes\n"));
}

#[test]
fn out_of_range_values_are_rejected() {
    let hierarchy = Hierarchy::default();
    let group = hierarchy.create_group(None).unwrap();

    let err = hierarchy.write_file(group, BURST_FILE, "18446744073709551615").unwrap_err();
    assert!(matches!(err, Error::InvalidValue { file, .. } if file == BURST_FILE));
    assert_eq!(hierarchy.read_file(group, BURST_FILE).unwrap(), "131072\n");

    assert!(matches!(
        hierarchy.write_file(group, "cgroup.net_shaper.limit", "1"),
        Err(Error::UnknownFile(_))
    ));
}
