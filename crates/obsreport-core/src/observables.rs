//! The fixed table of monitored quantities.
//!
//! Every engine indexes observables by their position in [`OBSERVABLES`];
//! the table never changes at runtime, so an index is a stable identity.

/// One monitored quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observable {
    /// Canonical short name, used for output file names.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

const fn obs(name: &'static str, description: &'static str) -> Observable {
    Observable { name, description }
}

/// All observables, in storage order.
pub const OBSERVABLES: &[Observable] = &[
    obs("users", "Users logged in"),
    obs("rootprocs", "Privileged system processes"),
    obs("otherprocs", "Non-privileged processes"),
    obs("diskfree", "Free disk on / partition"),
    obs("loadavg", "% kernel load utilization"),
    obs("netbiosns_in", "netbios name lookups (in)"),
    obs("netbiosns_out", "netbios name lookups (out)"),
    obs("netbiosdgm_in", "netbios name datagrams (in)"),
    obs("netbiosdgm_out", "netbios name datagrams (out)"),
    obs("netbiosssn_in", "netbios name sessions (in)"),
    obs("netbiosssn_out", "netbios name sessions (out)"),
    obs("irc_in", "IRC connections (in)"),
    obs("irc_out", "IRC connections (out)"),
    obs("cfengine_in", "cfengine connections (in)"),
    obs("cfengine_out", "cfengine connections (out)"),
    obs("nfsd_in", "nfs connections (in)"),
    obs("nfsd_out", "nfs connections (out)"),
    obs("smtp_in", "smtp connections (in)"),
    obs("smtp_out", "smtp connections (out)"),
    obs("www_in", "www connections (in)"),
    obs("www_out", "www connections (out)"),
    obs("ftp_in", "ftp connections (in)"),
    obs("ftp_out", "ftp connections (out)"),
    obs("ssh_in", "ssh connections (in)"),
    obs("ssh_out", "ssh connections (out)"),
    obs("wwws_in", "wwws connections (in)"),
    obs("wwws_out", "wwws connections (out)"),
    obs("icmp_in", "ICMP packets (in)"),
    obs("icmp_out", "ICMP packets (out)"),
    obs("udp_in", "UDP dgrams (in)"),
    obs("udp_out", "UDP dgrams (out)"),
    obs("dns_in", "DNS requests (in)"),
    obs("dns_out", "DNS requests (out)"),
    obs("tcpsyn_in", "TCP sessions (in)"),
    obs("tcpsyn_out", "TCP sessions (out)"),
    obs("tcpack_in", "TCP acks (in)"),
    obs("tcpack_out", "TCP acks (out)"),
    obs("tcpfin_in", "TCP finish (in)"),
    obs("tcpfin_out", "TCP finish (out)"),
    obs("tcpmisc_in", "TCP misc (in)"),
    obs("tcpmisc_out", "TCP misc (out)"),
    obs("webaccess", "Webserver hits"),
    obs("weberrors", "Webserver errors"),
    obs("syslog", "New log entries (Syslog)"),
    obs("messages", "New log entries (messages)"),
    obs("temp0", "CPU Temperature 0"),
    obs("temp1", "CPU Temperature 1"),
    obs("temp2", "CPU Temperature 2"),
    obs("temp3", "CPU Temperature 3"),
    obs("cpu", "%CPU utilization (all)"),
    obs("cpu0", "%CPU utilization 0"),
    obs("cpu1", "%CPU utilization 1"),
    obs("cpu2", "%CPU utilization 2"),
    obs("cpu3", "%CPU utilization 3"),
];

/// Number of observable slots in every stored sample.
pub const OBSERVABLE_COUNT: usize = OBSERVABLES.len();

/// Look up an observable index by canonical name.
pub fn index_of(name: &str) -> Option<usize> {
    OBSERVABLES.iter().position(|o| o.name == name)
}

/// Canonical name of observable `index`.
///
/// # Panics
/// Panics if `index >= OBSERVABLE_COUNT`.
pub fn name_of(index: usize) -> &'static str {
    OBSERVABLES[index].name
}
