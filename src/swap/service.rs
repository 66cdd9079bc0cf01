use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use elements::bitcoin::secp256k1::PublicKey;
use elements::{AddressParams, AssetId, Transaction, Txid, encode};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::error::{ChainError, PeerError, ProtocolError, StoreError, SwapError, WalletError};
use crate::lightning::{LightningClient, Preimage};
use crate::liquid::chain::BlockchainService;
use crate::liquid::tx;
use crate::liquid::wallet::Wallet;
use crate::swap::messages::{MakerResponse, PeerMessage, SwapRequest, WireSwapType};
use crate::swap::peer::PeerCommunicator;
use crate::swap::store::SqliteStore;
use crate::swap::watch::WatchList;
use crate::swap::{
    CLTV_TOLERANCE, FIXED_FEE_SAT, LOCKTIME_DELTA, Swap, SwapState, SwapType,
};

#[derive(Clone)]
pub struct SwapConfig {
    pub address_params: &'static AddressParams,
    pub policy_asset: AssetId,
    pub fixed_fee_sat: u64,
    pub locktime_delta: u32,
    pub cltv_tolerance: u32,
    pub poll_interval: Duration,
}

impl SwapConfig {
    pub fn new(address_params: &'static AddressParams, policy_asset: AssetId) -> Self {
        Self {
            address_params,
            policy_asset,
            fixed_fee_sat: FIXED_FEE_SAT,
            locktime_delta: LOCKTIME_DELTA,
            cltv_tolerance: CLTV_TOLERANCE,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// The swap coordination engine. Owns all collaborators by handle; one
/// instance drives every swap of the local node, serializing transitions
/// per swap id. Every transition is persisted before the side effect it
/// authorizes.
pub struct SwapService {
    cfg: SwapConfig,
    store: Arc<Mutex<SqliteStore>>,
    wallet: Arc<dyn Wallet>,
    chain: Arc<dyn BlockchainService>,
    lightning: Arc<dyn LightningClient>,
    peers: Arc<dyn PeerCommunicator>,
    watch_list: WatchList,
    swap_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl SwapService {
    pub fn new(
        cfg: SwapConfig,
        store: Arc<Mutex<SqliteStore>>,
        wallet: Arc<dyn Wallet>,
        chain: Arc<dyn BlockchainService>,
        lightning: Arc<dyn LightningClient>,
        peers: Arc<dyn PeerCommunicator>,
    ) -> Self {
        let (shutdown, _) = tokio::sync::watch::channel(false);
        Self {
            cfg,
            store,
            wallet,
            chain,
            lightning,
            peers,
            watch_list: WatchList::new(),
            swap_locks: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    /// Spawn the confirmation and refund pollers. They run until `stop`.
    pub fn start(self: &Arc<Self>) {
        let svc = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        let poll_interval = self.cfg.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => svc.poll_watched_swaps().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("confirmation watcher stopped");
        });

        let svc = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => svc.poll_refunds().await,
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
            tracing::debug!("refund watcher stopped");
        });
    }

    pub fn stop(&self) {
        tracing::info!("stopping swap service workers");
        let _ = self.shutdown.send(true);
    }

    /// Rebuild the watch list after a restart from swaps still awaiting
    /// their opening confirmation.
    pub fn resume(&self) -> Result<usize, SwapError> {
        let mut restored = 0;
        for swap in self.store_list()? {
            if swap.state == SwapState::WaitingForTx
                && let Some(opening_tx_id) = &swap.opening_tx_id
            {
                self.watch_list.insert(&swap.id, opening_tx_id);
                restored += 1;
            }
        }
        tracing::info!(restored, "watch list rebuilt from store");
        Ok(restored)
    }

    pub fn watch_list(&self) -> &WatchList {
        &self.watch_list
    }

    pub fn list_swaps(&self) -> Result<Vec<Swap>, SwapError> {
        Ok(self.store_list()?)
    }

    pub fn get_swap(&self, id: &str) -> Result<Swap, SwapError> {
        Ok(self.store_get(id)?)
    }

    /// Inbound requests we have not answered, e.g. swap-ins awaiting the
    /// responder flow.
    pub fn list_requested_swaps(&self) -> Result<Vec<Swap>, SwapError> {
        Ok(self
            .store_list()?
            .into_iter()
            .filter(|s| s.state == SwapState::RequestReceived)
            .collect())
    }

    pub async fn list_peers(&self) -> Result<Vec<String>, SwapError> {
        Ok(self.peers.list_peers().await?)
    }

    pub async fn wallet_balance(&self) -> Result<u64, SwapError> {
        Ok(self.wallet.balance().await?)
    }

    /// P2WSH address of a swap's contract output, for inspection.
    pub fn contract_address(&self, id: &str) -> Result<String, SwapError> {
        let swap = self.store_get(id)?;
        let script = swap.contract()?;
        Ok(script.p2wsh_address(self.cfg.address_params).to_string())
    }

    /// Administrative removal; only terminal swaps may be deleted.
    pub fn delete_swap(&self, id: &str) -> Result<(), SwapError> {
        let swap = self.store_get(id)?;
        if !swap.state.is_terminal() {
            return Err(ProtocolError::InvalidState {
                id: id.to_string(),
                state: swap.state,
                action: "be deleted before reaching a terminal state".to_string(),
            }
            .into());
        }
        self.store
            .lock()
            .expect("store mutex poisoned")
            .delete_by_id(id)?;
        Ok(())
    }

    pub async fn start_swap_out(
        &self,
        peer_node_id: &str,
        channel_id: &str,
        amount_sat: u64,
    ) -> Result<Swap, SwapError> {
        let taker_pubkey = self.wallet.pubkey().await?;
        let mut swap = Swap::new(SwapType::SwapOut, amount_sat, peer_node_id, channel_id);
        swap.taker_pubkey_hash = Some(hex::encode(taker_pubkey.serialize()));

        let _guard = self.lock_swap(&swap.id).await;
        self.store_create(&swap)?;
        tracing::info!(swap_id = %swap.id, peer_node_id, amount_sat, "starting swap-out");

        let request = SwapRequest {
            swap_id: swap.id.clone(),
            channel_id: swap.channel_id.clone(),
            amount_sat,
            swap_type: WireSwapType::SwapOut as i32,
            taker_pubkey_hash: swap.taker_pubkey_hash.clone().unwrap_or_default(),
        };
        if let Err(err) = self
            .peers
            .send_message(peer_node_id, PeerMessage::SwapRequest(request))
            .await
        {
            self.abort_swap(&swap.id);
            return Err(err.into());
        }

        self.persist_transition(&mut swap, SwapState::RequestSent)?;
        Ok(swap)
    }

    /// The originator of a swap-in funds the chain side itself, so it takes
    /// the maker role; the responder supplies the taker key in its answer.
    pub async fn start_swap_in(
        &self,
        peer_node_id: &str,
        channel_id: &str,
        amount_sat: u64,
    ) -> Result<Swap, SwapError> {
        let maker_pubkey = self.wallet.pubkey().await?;
        let mut swap = Swap::new(SwapType::SwapIn, amount_sat, peer_node_id, channel_id);
        swap.maker_pubkey_hash = Some(hex::encode(maker_pubkey.serialize()));

        let _guard = self.lock_swap(&swap.id).await;
        self.store_create(&swap)?;
        tracing::info!(swap_id = %swap.id, peer_node_id, amount_sat, "starting swap-in");

        let request = SwapRequest {
            swap_id: swap.id.clone(),
            channel_id: swap.channel_id.clone(),
            amount_sat,
            swap_type: WireSwapType::SwapIn as i32,
            taker_pubkey_hash: String::new(),
        };
        if let Err(err) = self
            .peers
            .send_message(peer_node_id, PeerMessage::SwapRequest(request))
            .await
        {
            self.abort_swap(&swap.id);
            return Err(err.into());
        }

        self.persist_transition(&mut swap, SwapState::RequestSent)?;
        Ok(swap)
    }

    /// Entry point for the peer transport.
    pub async fn on_message(
        &self,
        sender_node_id: &str,
        message: PeerMessage,
    ) -> Result<(), SwapError> {
        match message {
            PeerMessage::SwapRequest(request) => {
                self.on_swap_request(sender_node_id, request).await
            }
            PeerMessage::MakerResponse(response) => {
                self.on_maker_response(sender_node_id, response).await
            }
        }
    }

    pub async fn on_swap_request(
        &self,
        sender_node_id: &str,
        request: SwapRequest,
    ) -> Result<(), SwapError> {
        let swap_type = request.swap_type_kind()?;
        if request.swap_id.is_empty() {
            return Err(ProtocolError::BadMessage("swap request without id".to_string()).into());
        }
        if request.amount_sat == 0 {
            return Err(ProtocolError::BadMessage("swap request for 0 sat".to_string()).into());
        }

        let _guard = self.lock_swap(&request.swap_id).await;
        let mut swap = Swap {
            id: request.swap_id.clone(),
            swap_type,
            state: SwapState::RequestReceived,
            peer_node_id: sender_node_id.to_string(),
            channel_id: request.channel_id.clone(),
            amount_sat: request.amount_sat,
            taker_pubkey_hash: (!request.taker_pubkey_hash.is_empty())
                .then(|| request.taker_pubkey_hash.clone()),
            maker_pubkey_hash: None,
            payment_hash: None,
            payreq: None,
            cltv_expiry: None,
            opening_tx_id: None,
            claim_tx_id: None,
        };
        // A replayed request fails here with Duplicate and changes nothing.
        self.store_create(&swap)?;
        tracing::info!(
            swap_id = %swap.id,
            sender_node_id,
            amount_sat = swap.amount_sat,
            swap_type = ?swap_type,
            "swap request received"
        );

        match swap_type {
            // The requester wants to swap out, so we are the maker.
            SwapType::SwapOut => {
                if let Err(err) = self.respond_as_maker(&mut swap).await {
                    self.abort_swap(&swap.id);
                    return Err(err);
                }
                Ok(())
            }
            SwapType::SwapIn => {
                tracing::info!(
                    swap_id = %swap.id,
                    "swap-in responder flow not supported yet; request left pending"
                );
                Ok(())
            }
        }
    }

    async fn respond_as_maker(&self, swap: &mut Swap) -> Result<(), SwapError> {
        let maker_pubkey = self.wallet.pubkey().await?;
        swap.maker_pubkey_hash = Some(hex::encode(maker_pubkey.serialize()));
        if swap.taker_pubkey_hash.is_none() {
            return Err(
                ProtocolError::BadMessage("swap request without taker pubkey".to_string()).into(),
            );
        }

        let preimage = Preimage::generate();
        let invoice_msat = swap
            .amount_sat
            .checked_add(self.cfg.fixed_fee_sat)
            .and_then(|v| v.checked_mul(1000))
            .ok_or_else(|| ProtocolError::BadMessage("swap amount overflows".to_string()))?;
        let payreq = self
            .lightning
            .get_payreq(invoice_msat, &preimage, &swap.id)
            .await?;
        swap.payreq = Some(payreq.clone());
        swap.payment_hash = Some(hex::encode(preimage.hash()));

        let height = self.chain.block_height().await?;
        let cltv_expiry = height.saturating_add(self.cfg.locktime_delta);
        swap.cltv_expiry = Some(cltv_expiry);

        let opening = self.build_opening_tx(swap, &maker_pubkey).await?;
        self.persist_transition(swap, SwapState::OpeningTxPrepared)?;

        let opening_tx_id = self
            .chain
            .broadcast(&encode::serialize_hex(&opening))
            .await?;
        swap.opening_tx_id = Some(opening_tx_id.clone());
        self.persist_transition(swap, SwapState::OpeningTxBroadcasted)?;
        tracing::info!(swap_id = %swap.id, opening_tx_id = %opening_tx_id, "opening tx broadcast");

        let response = MakerResponse {
            swap_id: swap.id.clone(),
            maker_pubkey_hash: swap.maker_pubkey_hash.clone().unwrap_or_default(),
            invoice: payreq,
            tx_id: opening_tx_id,
            cltv_expiry,
        };
        self.peers
            .send_message(&swap.peer_node_id, PeerMessage::MakerResponse(response))
            .await?;
        Ok(())
    }

    async fn build_opening_tx(
        &self,
        swap: &Swap,
        maker_pubkey: &PublicKey,
    ) -> Result<Transaction, SwapError> {
        let needed_sat = swap
            .amount_sat
            .checked_add(self.cfg.fixed_fee_sat)
            .ok_or_else(|| ProtocolError::BadMessage("swap amount overflows".to_string()))?;
        let (utxos, change_sat) = self.wallet.select_utxos(needed_sat).await?;
        let inputs = self.chain.utxos_to_tx_inputs(&utxos);

        let script = swap.contract()?;
        let unsigned = tx::build_opening_tx(
            inputs,
            &script,
            swap.amount_sat,
            change_sat,
            maker_pubkey,
            self.cfg.policy_asset,
            self.cfg.fixed_fee_sat,
        );

        let first_input = unsigned.input.first().ok_or(WalletError::InsufficientFunds {
            needed_sat,
            available_sat: 0,
        })?;
        let ancestor_txid = first_input.previous_output.txid.to_string();
        let ancestor_hex = self.chain.fetch_tx_hex(&ancestor_txid).await?;
        let ancestor = decode_tx_hex(&ancestor_hex)?;

        let maker_privkey = self.wallet.privkey().await?;
        let witness = tx::sign_opening_input(&unsigned, &ancestor, &maker_privkey)?;
        Ok(tx::finalize_opening_tx(unsigned, ancestor, witness)?)
    }

    pub async fn on_maker_response(
        &self,
        sender_node_id: &str,
        response: MakerResponse,
    ) -> Result<(), SwapError> {
        let _guard = self.lock_swap(&response.swap_id).await;
        let mut swap = self.store_get(&response.swap_id)?;

        // An answer from anyone but the recorded peer is dropped without
        // touching the record; the real maker may still answer.
        if swap.peer_node_id != sender_node_id {
            return Err(PeerError::Mismatch {
                want: swap.peer_node_id.clone(),
                got: sender_node_id.to_string(),
            }
            .into());
        }
        if !swap.state.can_advance_to(SwapState::WaitingForTx) {
            return Err(ProtocolError::InvalidState {
                id: swap.id.clone(),
                state: swap.state,
                action: "accept a maker response".to_string(),
            }
            .into());
        }

        if let Err(err) = self.accept_maker_response(&mut swap, response).await {
            self.abort_swap(&swap.id);
            return Err(err);
        }
        Ok(())
    }

    async fn accept_maker_response(
        &self,
        swap: &mut Swap,
        response: MakerResponse,
    ) -> Result<(), SwapError> {
        let maker_pubkey_bytes = hex::decode(&response.maker_pubkey_hash)
            .map_err(|e| ProtocolError::BadMessage(format!("maker pubkey hex: {e}")))?;
        PublicKey::from_slice(&maker_pubkey_bytes)
            .map_err(|e| ProtocolError::BadMessage(format!("maker pubkey: {e}")))?;
        parse_txid(&response.tx_id)
            .map_err(|e| ProtocolError::BadMessage(format!("opening txid: {e}")))?;

        let decoded = self.lightning.decode_payreq(&response.invoice)?;
        let invoice_msat = decoded.amount_msat.ok_or_else(|| {
            ProtocolError::BadMessage("invoice does not specify an amount".to_string())
        })?;
        let max_msat = swap
            .amount_sat
            .checked_add(self.cfg.fixed_fee_sat)
            .and_then(|v| v.checked_mul(1000))
            .ok_or_else(|| ProtocolError::BadMessage("swap amount overflows".to_string()))?;
        if invoice_msat > max_msat {
            return Err(ProtocolError::InvoiceOverpay {
                invoice_msat,
                max_msat,
            }
            .into());
        }

        // The decoded invoice is authoritative for the payment hash.
        let payment_hash_hex = hex::encode(decoded.payment_hash);
        if let Some(existing) = &swap.payment_hash
            && existing != &payment_hash_hex
        {
            return Err(ProtocolError::ContractMismatch(
                "invoice payment hash conflicts with recorded value".to_string(),
            )
            .into());
        }

        let height = self.chain.block_height().await?;
        let expected_cltv = height.saturating_add(self.cfg.locktime_delta);
        if response.cltv_expiry.abs_diff(expected_cltv) > self.cfg.cltv_tolerance {
            return Err(ProtocolError::ContractMismatch(format!(
                "cltv_expiry {} outside tolerated window around {expected_cltv}",
                response.cltv_expiry
            ))
            .into());
        }

        swap.maker_pubkey_hash = Some(response.maker_pubkey_hash.clone());
        swap.payreq = Some(response.invoice.clone());
        swap.payment_hash = Some(payment_hash_hex);
        swap.cltv_expiry = Some(response.cltv_expiry);
        swap.opening_tx_id = Some(response.tx_id.clone());
        self.persist_transition(swap, SwapState::WaitingForTx)?;

        self.watch_list.insert(&swap.id, &response.tx_id);
        tracing::info!(
            swap_id = %swap.id,
            opening_tx_id = %response.tx_id,
            "maker response accepted, watching for confirmation"
        );
        Ok(())
    }

    /// Driven by the watcher once the opening tx confirms: verify it
    /// against the recorded terms, pay the invoice, claim the output.
    pub async fn on_opening_confirmed(&self, swap_id: &str) -> Result<(), SwapError> {
        let _guard = self.lock_swap(swap_id).await;
        let mut swap = self.store_get(swap_id)?;
        if swap.state != SwapState::WaitingForTx {
            self.watch_list.remove(swap_id);
            return Ok(());
        }

        if let Err(err) = self.verify_and_claim(&mut swap).await {
            self.abort_swap(&swap.id);
            return Err(err);
        }
        self.watch_list.remove(swap_id);
        Ok(())
    }

    async fn verify_and_claim(&self, swap: &mut Swap) -> Result<(), SwapError> {
        let opening_tx_id = swap.opening_tx_id.clone().ok_or_else(|| {
            ProtocolError::ContractMismatch("swap record is missing opening_tx_id".to_string())
        })?;
        let opening_hex = self.chain.fetch_tx_hex(&opening_tx_id).await?;
        let opening = decode_tx_hex(&opening_hex)?;
        let script = swap.contract()?;
        tx::verify_opening_tx(&opening, &script, swap.amount_sat)?;

        // Past the refund height the maker may sweep the output; paying
        // the invoice now would risk losing both sides.
        let height = self.chain.block_height().await?;
        if height >= script.cltv_expiry {
            return Err(ProtocolError::InvalidState {
                id: swap.id.clone(),
                state: swap.state,
                action: format!(
                    "claim at height {height}: refund path opens at {}",
                    script.cltv_expiry
                ),
            }
            .into());
        }

        let payreq = swap.payreq.clone().ok_or_else(|| {
            ProtocolError::ContractMismatch("swap record is missing payreq".to_string())
        })?;
        let preimage = self.lightning.pay_invoice(&payreq).await?;
        if swap.payment_hash.as_deref() != Some(hex::encode(preimage.hash()).as_str()) {
            return Err(ProtocolError::ContractMismatch(
                "revealed preimage does not match recorded payment hash".to_string(),
            )
            .into());
        }

        let taker_privkey = self.wallet.privkey().await?;
        let opening_txid = parse_txid(&opening_tx_id)?;
        let claim = tx::claim_tx(
            &script,
            opening_txid,
            swap.amount_sat,
            &taker_privkey,
            &preimage,
            self.cfg.policy_asset,
            self.cfg.fixed_fee_sat,
        )?;
        let claim_tx_id = self.chain.broadcast(&encode::serialize_hex(&claim)).await?;
        swap.claim_tx_id = Some(claim_tx_id.clone());
        self.persist_transition(swap, SwapState::ClaimedPreimage)?;
        tracing::info!(swap_id = %swap.id, claim_tx_id = %claim_tx_id, "claimed opening output via preimage");
        Ok(())
    }

    /// One pass over the watch list; called by the confirmation poller.
    pub async fn poll_watched_swaps(&self) {
        for (swap_id, opening_tx_id) in self.watch_list.snapshot() {
            match self.chain.tx_confirmations(&opening_tx_id).await {
                Ok(Some(confs)) if confs > 0 => {
                    if let Err(err) = self.on_opening_confirmed(&swap_id).await {
                        tracing::warn!(
                            swap_id = %swap_id,
                            error = %err,
                            "handling confirmed opening tx failed"
                        );
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(swap_id = %swap_id, error = %err, "confirmation poll failed");
                }
            }
        }
    }

    /// One pass over maker-side swaps whose refund height has been
    /// reached; called by the refund poller.
    pub async fn poll_refunds(&self) {
        let swaps = match self.store_list() {
            Ok(swaps) => swaps,
            Err(err) => {
                tracing::warn!(error = %err, "refund scan: list swaps failed");
                return;
            }
        };
        let height = match self.chain.block_height().await {
            Ok(height) => height,
            Err(err) => {
                tracing::warn!(error = %err, "refund scan: block height failed");
                return;
            }
        };

        for swap in swaps {
            if swap.state != SwapState::OpeningTxBroadcasted {
                continue;
            }
            let Some(cltv_expiry) = swap.cltv_expiry else {
                continue;
            };
            if height < cltv_expiry {
                continue;
            }
            if let Err(err) = self.refund_swap(&swap.id).await {
                tracing::warn!(swap_id = %swap.id, error = %err, "refund failed");
            }
        }
    }

    async fn refund_swap(&self, id: &str) -> Result<(), SwapError> {
        let _guard = self.lock_swap(id).await;
        let mut swap = self.store_get(id)?;
        if swap.state != SwapState::OpeningTxBroadcasted {
            return Ok(());
        }

        let script = swap.contract()?;
        let opening_tx_id = swap.opening_tx_id.clone().ok_or_else(|| {
            ProtocolError::ContractMismatch("swap record is missing opening_tx_id".to_string())
        })?;
        let opening_txid = parse_txid(&opening_tx_id)?;

        let maker_privkey = self.wallet.privkey().await?;
        let refund = tx::refund_tx(
            &script,
            opening_txid,
            swap.amount_sat,
            &maker_privkey,
            self.cfg.policy_asset,
            self.cfg.fixed_fee_sat,
        )?;
        let refund_tx_id = self
            .chain
            .broadcast(&encode::serialize_hex(&refund))
            .await?;
        self.persist_transition(&mut swap, SwapState::RefundedTimeout)?;
        tracing::info!(swap_id = %swap.id, refund_tx_id = %refund_tx_id, "broadcast refund tx");
        Ok(())
    }

    /// Validate the edge and persist the new state; callers perform the
    /// side effect the new state authorizes only after this returns.
    fn persist_transition(&self, swap: &mut Swap, next: SwapState) -> Result<(), SwapError> {
        if !swap.state.can_advance_to(next) {
            return Err(ProtocolError::InvalidState {
                id: swap.id.clone(),
                state: swap.state,
                action: format!("advance to {next:?}"),
            }
            .into());
        }
        let prev = swap.state;
        swap.state = next;
        if let Err(err) = self.store_update(swap) {
            swap.state = prev;
            return Err(err.into());
        }
        tracing::debug!(swap_id = %swap.id, from = ?prev, to = ?next, "swap state persisted");
        Ok(())
    }

    fn abort_swap(&self, id: &str) {
        match self.store_get(id) {
            Ok(mut swap) if !swap.state.is_terminal() => {
                swap.state = SwapState::Aborted;
                if let Err(err) = self.store_update(&swap) {
                    tracing::error!(swap_id = %id, error = %err, "failed to persist abort");
                } else {
                    tracing::warn!(swap_id = %id, "swap aborted");
                }
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(swap_id = %id, error = %err, "abort: cannot load swap");
            }
        }
        self.watch_list.remove(id);
    }

    async fn lock_swap(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.swap_locks.lock().expect("swap lock map poisoned");
            locks.entry(id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    fn store_create(&self, swap: &Swap) -> Result<(), StoreError> {
        self.store.lock().expect("store mutex poisoned").create(swap)
    }

    fn store_update(&self, swap: &Swap) -> Result<(), StoreError> {
        self.store.lock().expect("store mutex poisoned").update(swap)
    }

    fn store_get(&self, id: &str) -> Result<Swap, StoreError> {
        self.store.lock().expect("store mutex poisoned").get_by_id(id)
    }

    fn store_list(&self) -> Result<Vec<Swap>, StoreError> {
        self.store.lock().expect("store mutex poisoned").list_all()
    }
}

fn decode_tx_hex(tx_hex: &str) -> Result<Transaction, ChainError> {
    let bytes = hex::decode(tx_hex)
        .map_err(|e| ChainError::Unreachable(format!("backend returned bad tx hex: {e}")))?;
    encode::deserialize(&bytes)
        .map_err(|e| ChainError::Unreachable(format!("backend returned undecodable tx: {e}")))
}

fn parse_txid(txid: &str) -> Result<Txid, ProtocolError> {
    txid.parse::<Txid>()
        .map_err(|e| ProtocolError::ContractMismatch(format!("invalid txid {txid}: {e}")))
}
