//! Resolution of `${host.*}` placeholders in the reporter tag.

use std::net::ToSocketAddrs;

use tracing::warn;

const NAME: &str = "${host.name}";
const SHORT_NAME: &str = "${host.name.short}";
const FQDN: &str = "${host.fqdn}";
const ADDRESS: &str = "${host.address}";

/// Identity of the local machine used to fill tag placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    pub name: String,
    /// Empty unless the template asked for it.
    pub address: String,
}

impl HostIdentity {
    /// Looks up what `template` references.
    ///
    /// The hostname comes from the OS. The address needs a resolver lookup,
    /// which blocks, and is only performed when `template` contains
    /// `${host.address}`.
    pub fn local_for(template: &str) -> Self {
        let name = match hostname::get() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!(error = %e, "Could not read local hostname, using localhost");
                "localhost".to_string()
            }
        };
        let address = if template.contains(ADDRESS) {
            lookup_address(&name)
        } else {
            String::new()
        };

        Self { name, address }
    }

    fn short_name(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

/// Whether resolving `template` performs a blocking address lookup.
pub fn needs_lookup(template: &str) -> bool {
    template.contains(ADDRESS)
}

fn lookup_address(name: &str) -> String {
    (name, 0)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Replaces `${host.name}`, `${host.name.short}`, `${host.fqdn}` and
/// `${host.address}` in `template`. Other text is kept as is.
///
/// `${host.fqdn}` is the hostname as the OS reports it. No reverse lookup is
/// made, so it is only fully qualified when the OS hostname is.
pub fn resolve_tag(template: &str, identity: &HostIdentity) -> String {
    template
        .replace(SHORT_NAME, identity.short_name())
        .replace(NAME, &identity.name)
        .replace(FQDN, &identity.name)
        .replace(ADDRESS, &identity.address)
}
