use serde::Deserialize;

/// An entry of the `/applications/detectable` list Discord uses for game
/// detection. Only the fields the icon lookup needs are kept.
#[derive(Clone, Debug, Deserialize)]
pub struct DetectableApplication {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RpcApplication {
    pub id: String,
    #[serde(default)]
    pub icon: Option<String>,
}
