/*
[INPUT]:  Namespace address and subscription query
[OUTPUT]: Event channel contract, socket.io implementation, packet codec
[POS]:    WebSocket layer - task status event stream
[UPDATE]: When changing the event transport or its framing
*/

pub mod client;
pub mod packet;

pub use client::{EventChannel, SocketEventChannel, Subscription};
pub use packet::{Packet, SocketKind, SocketPacket};
