// ============================================================================
// MODELS
// ============================================================================
//
// Modules:
//   - users : user entity (credentials + OAuth), role, read projections
//   - accounts : OAuth provider links, many-to-one to users
//   - schemas : payload validation for every action
//   - dto : response / request shapes
//   - health : health check response
//
// Notes:
//   - Emails are stored lowercase; every lookup lowercases its input
//   - Token pairs (token + expiry) are always written or cleared together
//
// ============================================================================

pub mod accounts;
pub mod dto;
pub mod health;
pub mod schemas;
pub mod users;
