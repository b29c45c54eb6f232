//! Check command: run the URL, allowlist and DNS gates and report the pin.

use anyhow::Result;
use pinfetch_core::resolver::HostResolver;
use pinfetch_core::TrustedImageFetcher;

pub async fn run_check<R: HostResolver>(fetcher: &TrustedImageFetcher<R>, url: &str) -> Result<()> {
    let request = fetcher.verify(url).await?;
    println!("url:      {}", request.url());
    println!("host:     {} (trusted)", request.host());
    for ip in request.verified_ips() {
        println!("address:  {}", ip);
    }
    println!("pinned:   {}", request.pinned_ip());
    Ok(())
}
