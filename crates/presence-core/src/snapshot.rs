const TOKEN_LEN: usize = 32;

/// Builds the LAN snapshot URL for a camera from its cloud (VPN) snapshot URL.
pub fn local_snapshot_url(remote_url: &str, lan_address: &str) -> Option<String> {
    let token = remote_url
        .split('/')
        .find(|fragment| fragment.len() == TOKEN_LEN)?;

    Some(format!("http://{lan_address}/{token}/live/snapshot_720.jpg"))
}
