//! Parsers for `VBoxManage` output.

use crate::{HostOnlyInterface, VmInfo};

/// Names from `list vms` / `list runningvms`, which print `"name" {uuid}` per line.
pub(crate) fn parse_vm_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let rest = line.trim().strip_prefix('"')?;
            let (name, _) = rest.split_once('"')?;
            Some(name.to_string())
        })
        .collect()
}

/// `key=value` pairs from `showvminfo --machinereadable`, quotes stripped.
pub(crate) fn parse_machine_readable(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            Some((unquote(key).to_string(), unquote(value).to_string()))
        })
        .collect()
}

pub(crate) fn machine_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub(crate) fn parse_vm_info(pairs: &[(String, String)]) -> Option<VmInfo> {
    let memory = machine_value(pairs, "memory")?.parse().ok()?;
    let cpus = machine_value(pairs, "cpus")?.parse().ok()?;
    Some(VmInfo { memory, cpus })
}

/// Host port of the NAT rule `rule`, from `Forwarding(n)="rule,tcp,host-ip,host-port,guest-ip,guest-port"`.
pub(crate) fn parse_forward_port(pairs: &[(String, String)], rule: &str) -> Option<u16> {
    pairs
        .iter()
        .filter(|(key, _)| key.starts_with("Forwarding("))
        .find_map(|(_, value)| {
            let fields: Vec<&str> = value.split(',').collect();
            match fields.as_slice() {
                [name, _, _, host_port, _, _] if *name == rule => host_port.parse().ok(),
                _ => None,
            }
        })
}

pub(crate) fn parse_host_only_interfaces(output: &str) -> Vec<HostOnlyInterface> {
    let mut interfaces: Vec<HostOnlyInterface> = Vec::new();
    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "Name" => interfaces.push(HostOnlyInterface {
                name: value.to_string(),
                ip: String::new(),
            }),
            "IPAddress" => {
                if let Some(interface) = interfaces.last_mut() {
                    interface.ip = value.to_string();
                }
            }
            _ => {}
        }
    }
    interfaces
}

/// Interface name from `Interface 'vboxnet0' was successfully created`.
pub(crate) fn parse_created_interface(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Interface '")?;
        let (name, tail) = rest.split_once('\'')?;
        tail.contains("successfully created")
            .then(|| name.to_string())
    })
}

/// `getextradata` prints `Value: x`, or `No value set!`.
pub(crate) fn parse_extra_data(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("Value: "))
        .map(str::to_string)
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}
