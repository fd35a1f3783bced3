use kubeapis::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = kube::Config::infer().await?;
    // namespaced objects without a namespace of their own land here
    println!("namespace={}", config.default_namespace);
    let client = Client::try_from(config)?;

    let version = client.version().await?;
    println!("server={}", version.git_version);

    let mut apis = vec![client.core_api()];
    apis.extend(client.apis(true).await?);

    for api in apis {
        for resource in api.api_resources().await?.iter() {
            if resource.name.contains('/') {
                continue;
            }
            println!("{} {} {}", api.group_version(), resource.kind, resource.name);
        }
    }

    Ok(())
}
