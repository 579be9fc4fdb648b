use crate::{config, error, info, spotify, utils};

/// Prints the authorization URL for a manual login.
pub async fn login_url() {
    let credentials = match config::credentials() {
        Ok(c) => c,
        Err(e) => error!("{}", e),
    };
    let endpoints = config::Endpoints::from_env();

    match spotify::auth::authorize_url(
        &endpoints.auth_url,
        &credentials,
        &config::spotify_scope(),
        &utils::generate_state(),
    ) {
        Ok(url) => {
            info!("Open the following URL to log in to Spotify:");
            println!("{url}");
        }
        Err(e) => error!("{}", e),
    }
}
