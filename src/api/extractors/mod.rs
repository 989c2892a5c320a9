/*!
 * Credential extraction
 *
 * Responsibility:
 * - Pull the API token and session token out of headers/cookies
 * - Normalise them so handlers only see bare, non-empty tokens
 */

mod credentials;

pub use credentials::Credentials;
