// Linux-specific helpers: /sys/class/net.

/// ARPHRD_LOOPBACK from <linux/if_arp.h>.
#[cfg(target_os = "linux")]
const ARPHRD_LOOPBACK: u32 = 772;

/// Whether an interface is a loopback device. Reads /sys/class/net/<interface>/type on Linux,
/// falls back to the conventional `lo`/`lo0` names elsewhere or when sysfs is unavailable.
pub(super) fn is_loopback(interface_name: &str) -> bool {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/class/net/{}/type", interface_name);
        if let Ok(content) = std::fs::read_to_string(&path)
            && let Ok(kind) = content.trim().parse::<u32>()
        {
            return kind == ARPHRD_LOOPBACK;
        }
    }
    interface_name == "lo" || interface_name == "lo0"
}
